//! Little-endian Level 5 writer.

use crate::{
    array::{Array, ArrayData},
    common::*,
    reader::HEADER_SIZE,
    types::DataType,
};
use flate2::{write::ZlibEncoder, Compression};

const VERSION: u16 = 0x0100;
const DEFAULT_DESCRIPTION: &str = "MATLAB 5.0 MAT-file, written by mat5";

/// Round up to the 8-byte boundary that data elements are aligned to.
pub(crate) fn padded_len(len: usize) -> usize {
    (len + 7) / 8 * 8
}

/// Collects arrays and serializes them into a MAT-file.
#[derive(Debug, Clone)]
pub struct MatWriter {
    description: String,
    compress: bool,
    arrays: Vec<Array>,
}

impl Default for MatWriter {
    fn default() -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            compress: false,
            arrays: vec![],
        }
    }
}

impl MatWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap every variable in a zlib-compressed element.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn push(&mut self, array: Array) -> &mut Self {
        self.arrays.push(array);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);

        // header
        let mut text = self.description.clone().into_bytes();
        ensure!(
            text.len() <= 116,
            "header description exceeds 116 bytes"
        );
        text.resize(116, b' ');
        buf.extend_from_slice(&text);
        buf.extend_from_slice(&[0u8; 8]);
        buf.write_u16::<LittleEndian>(VERSION)?;
        buf.extend_from_slice(b"IM");

        for array in &self.arrays {
            let mut element = vec![];
            push_element(&mut element, DataType::Matrix, &encode_matrix(array)?)?;

            if self.compress {
                let mut encoder = ZlibEncoder::new(vec![], Compression::default());
                encoder.write_all(&element)?;
                let compressed = encoder.finish()?;
                buf.write_u32::<LittleEndian>(DataType::Compressed.code())?;
                buf.write_u32::<LittleEndian>(compressed.len() as u32)?;
                buf.extend_from_slice(&compressed);
            } else {
                buf.extend_from_slice(&element);
            }
        }

        Ok(buf)
    }

    pub fn write<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()?)
            .with_context(|| format!("failed to write MAT-file '{}'", path.display()))?;
        Ok(())
    }
}

fn push_element(buf: &mut Vec<u8>, data_type: DataType, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| format_err!("data element of {} bytes is too large", data.len()))?;
    buf.write_u32::<LittleEndian>(data_type.code())?;
    buf.write_u32::<LittleEndian>(len)?;
    buf.extend_from_slice(data);
    buf.resize(buf.len() + padded_len(data.len()) - data.len(), 0);
    Ok(())
}

/// Encode the sub-elements of a matrix element.
fn encode_matrix(array: &Array) -> Result<Vec<u8>> {
    let Array {
        name,
        class,
        dims,
        data,
    } = array;
    let mut buf = vec![];

    let is_complex = matches!(data, ArrayData::Numeric { imag: Some(_), .. });
    let mut flags = vec![];
    flags.write_u32::<LittleEndian>(*class as u32 | if is_complex { 0x0800 } else { 0 })?;
    flags.write_u32::<LittleEndian>(0)?;
    push_element(&mut buf, DataType::UInt32, &flags)?;

    let mut dims_bytes = vec![];
    dims.iter().try_for_each(|&dim| -> Result<_> {
        let dim = i32::try_from(dim).map_err(|_| format_err!("dimension {} is too large", dim))?;
        dims_bytes.write_i32::<LittleEndian>(dim)?;
        Ok(())
    })?;
    push_element(&mut buf, DataType::Int32, &dims_bytes)?;
    push_element(&mut buf, DataType::Int8, name.as_bytes())?;

    match data {
        ArrayData::Numeric { real, imag } => {
            let encode = |values: &[f64]| -> Result<Vec<u8>> {
                let mut bytes = Vec::with_capacity(values.len() * 8);
                values
                    .iter()
                    .try_for_each(|&value| bytes.write_f64::<LittleEndian>(value))?;
                Ok(bytes)
            };
            push_element(&mut buf, DataType::Double, &encode(real)?)?;
            if let Some(imag) = imag {
                push_element(&mut buf, DataType::Double, &encode(imag)?)?;
            }
        }
        ArrayData::Char(chars) => {
            let text: String = chars.iter().collect();
            ensure!(
                text.encode_utf16().count() == chars.len(),
                "characters outside the basic multilingual plane are not supported"
            );
            let mut bytes = vec![];
            text.encode_utf16()
                .try_for_each(|unit| bytes.write_u16::<LittleEndian>(unit))?;
            push_element(&mut buf, DataType::UInt16, &bytes)?;
        }
        ArrayData::Cell(cells) => {
            cells.iter().try_for_each(|cell| -> Result<_> {
                push_element(&mut buf, DataType::Matrix, &encode_matrix(cell)?)
            })?;
        }
        ArrayData::Unsupported => bail!("array '{}' of class {} cannot be written", name, class),
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MatFile;

    #[test]
    fn padding() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 8);
        assert_eq!(padded_len(8), 8);
        assert_eq!(padded_len(13), 16);
    }

    #[test]
    fn header_layout() {
        let bytes = MatWriter::new().to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[126..128], b"IM");

        let file = MatFile::from_bytes(&bytes).unwrap();
        assert_eq!(file.header.text, DEFAULT_DESCRIPTION);
        assert_eq!(file.header.version, VERSION);
    }

    #[test]
    fn reject_unsupported() {
        let mut array = Array::empty();
        array.data = ArrayData::Unsupported;
        let mut writer = MatWriter::new();
        writer.push(array);
        assert!(writer.to_bytes().is_err());
    }
}
