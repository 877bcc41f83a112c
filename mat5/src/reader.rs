use crate::{
    array::{Array, ArrayData},
    common::*,
    types::{ArrayClass, DataType},
};
use flate2::read::ZlibDecoder;

pub const HEADER_SIZE: usize = 128;
const HEADER_TEXT_SIZE: usize = 116;

const FLAG_COMPLEX: u32 = 0x0800;

/// Byte order declared by the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub text: String,
    pub version: u16,
    pub endian: Endian,
}

/// A parsed MAT-file.
#[derive(Debug, Clone)]
pub struct MatFile {
    pub header: Header,
    arrays: IndexMap<String, Array>,
}

impl MatFile {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read MAT-file '{}'", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("failed to parse MAT-file '{}'", path.display()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= HEADER_SIZE,
            "the file has {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_SIZE
        );
        let (header_bytes, body) = bytes.split_at(HEADER_SIZE);

        // Level 4 files start with a zero-padded numeric header
        ensure!(
            header_bytes[0..4].iter().any(|&byte| byte != 0),
            "not a Level 5 MAT-file"
        );

        let endian = match &header_bytes[126..128] {
            b"IM" => Endian::Little,
            b"MI" => Endian::Big,
            other => bail!("invalid endian indicator {:?}", other),
        };
        let version = match endian {
            Endian::Little => LittleEndian::read_u16(&header_bytes[124..126]),
            Endian::Big => BigEndian::read_u16(&header_bytes[124..126]),
        };
        let text = String::from_utf8_lossy(&header_bytes[0..HEADER_TEXT_SIZE])
            .trim_end_matches(|ch| ch == ' ' || ch == '\0')
            .to_string();

        let arrays = match endian {
            Endian::Little => parse_top_level::<LittleEndian>(body)?,
            Endian::Big => parse_top_level::<BigEndian>(body)?,
        };

        Ok(Self {
            header: Header {
                text,
                version,
                endian,
            },
            arrays,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Array> {
        self.arrays.get(name)
    }

    /// Get an array by name, failing if it is absent.
    pub fn require(&self, name: &str) -> Result<&Array> {
        self.get(name)
            .ok_or_else(|| format_err!("variable '{}' is not found", name))
    }

    /// Iterate the variables in file order.
    pub fn arrays(&self) -> impl Iterator<Item = &Array> {
        self.arrays.values()
    }
}

#[derive(Debug, Clone, Copy)]
struct Element<'a> {
    code: u32,
    data: &'a [u8],
}

impl Element<'_> {
    fn data_type(&self) -> Result<DataType> {
        DataType::from_code(self.code)
            .ok_or_else(|| format_err!("unknown data type code {}", self.code))
    }
}

fn parse_top_level<B>(body: &[u8]) -> Result<IndexMap<String, Array>>
where
    B: ByteOrder,
{
    let mut arrays = IndexMap::new();
    let mut insert = |array: Array| {
        if let Some(prev) = arrays.insert(array.name.clone(), array) {
            warn!("variable '{}' is defined more than once", prev.name);
        }
    };

    let mut cursor = body;
    while let Some(element) = next_element::<B>(&mut cursor)? {
        match DataType::from_code(element.code) {
            Some(DataType::Matrix) => {
                insert(parse_matrix::<B>(element.data)?);
            }
            Some(DataType::Compressed) => {
                let mut inflated = vec![];
                ZlibDecoder::new(element.data)
                    .read_to_end(&mut inflated)
                    .context("failed to inflate compressed element")?;

                let mut inner = inflated.as_slice();
                while let Some(element) = next_element::<B>(&mut inner)? {
                    ensure!(
                        element.code == DataType::Matrix.code(),
                        "compressed element holds data type {}, expect a matrix",
                        element.code
                    );
                    insert(parse_matrix::<B>(element.data)?);
                }
            }
            _ => {
                debug!("skip top-level element of type {}", element.code);
            }
        }
    }

    Ok(arrays)
}

/// Take the next data element off the cursor.
fn next_element<'a, B>(cursor: &mut &'a [u8]) -> Result<Option<Element<'a>>>
where
    B: ByteOrder,
{
    let buf: &'a [u8] = *cursor;
    if buf.is_empty() {
        return Ok(None);
    }
    ensure!(
        buf.len() >= 8,
        "truncated data element tag, {} bytes left",
        buf.len()
    );

    let word = B::read_u32(&buf[0..4]);
    let (element, consumed) = if word >> 16 != 0 {
        // small data element: the size and type share one word
        let len = (word >> 16) as usize;
        ensure!(
            len <= 4,
            "small data element declares {} bytes, at most 4 allowed",
            len
        );
        let element = Element {
            code: word & 0xffff,
            data: &buf[4..(4 + len)],
        };
        (element, 8)
    } else {
        let len = B::read_u32(&buf[4..8]) as usize;
        let remaining = buf.len() - 8;
        ensure!(
            len <= remaining,
            "data element declares {} bytes, but only {} bytes are left",
            len,
            remaining
        );

        let padded_len = if word == DataType::Compressed.code() {
            len
        } else {
            crate::writer::padded_len(len)
        };
        let element = Element {
            code: word,
            data: &buf[8..(8 + len)],
        };
        // writers may omit the padding of the last element
        (element, (8 + padded_len).min(buf.len()))
    };

    *cursor = &buf[consumed..];
    Ok(Some(element))
}

fn expect_element<'a, B>(cursor: &mut &'a [u8], what: &str) -> Result<Element<'a>>
where
    B: ByteOrder,
{
    next_element::<B>(cursor)?.ok_or_else(|| format_err!("missing {} element", what))
}

fn parse_matrix<B>(data: &[u8]) -> Result<Array>
where
    B: ByteOrder,
{
    if data.is_empty() {
        return Ok(Array::empty());
    }
    let mut cursor = data;

    // array flags
    let flags = expect_element::<B>(&mut cursor, "array flags")?;
    ensure!(
        flags.code == DataType::UInt32.code() && flags.data.len() == 8,
        "malformed array flags"
    );
    let flag_word = B::read_u32(&flags.data[0..4]);
    let class = ArrayClass::try_from((flag_word & 0xff) as u8)?;
    let is_complex = flag_word & FLAG_COMPLEX != 0;

    // dimensions
    let dims = expect_element::<B>(&mut cursor, "dimensions")?;
    ensure!(
        dims.code == DataType::Int32.code(),
        "dimensions are stored as data type {}, expect int32",
        dims.code
    );
    let dims: Vec<usize> = dims
        .data
        .chunks_exact(4)
        .map(|chunk| {
            let dim = B::read_i32(chunk);
            usize::try_from(dim).map_err(|_| format_err!("negative dimension {}", dim))
        })
        .try_collect()?;
    ensure!(dims.len() >= 2, "an array must have at least two dimensions");

    // name
    let name = expect_element::<B>(&mut cursor, "array name")?;
    let name = String::from_utf8(name.data.to_vec()).context("array name is not valid UTF-8")?;

    let num_elements: usize = dims.iter().product();

    let data = match class {
        ArrayClass::Cell => {
            let cells: Vec<_> = (0..num_elements)
                .map(|index| -> Result<_> {
                    let element = expect_element::<B>(&mut cursor, "cell")?;
                    ensure!(
                        element.code == DataType::Matrix.code(),
                        "cell {} of '{}' is not a matrix element",
                        index,
                        name
                    );
                    parse_matrix::<B>(element.data)
                        .with_context(|| format!("failed to parse cell {} of '{}'", index, name))
                })
                .try_collect()?;
            ArrayData::Cell(cells)
        }
        ArrayClass::Char => {
            let element = expect_element::<B>(&mut cursor, "character data")?;
            let chars = read_chars::<B>(element)
                .with_context(|| format!("failed to decode characters of '{}'", name))?;
            ensure!(
                chars.len() == num_elements,
                "character array '{}' holds {} characters, but its dimensions are {:?}",
                name,
                chars.len(),
                dims
            );
            ArrayData::Char(chars)
        }
        class if class.is_numeric() => {
            let real = read_numbers::<B>(expect_element::<B>(&mut cursor, "real part")?)?;
            ensure!(
                real.len() == num_elements,
                "numeric array '{}' holds {} values, but its dimensions are {:?}",
                name,
                real.len(),
                dims
            );
            let imag = if is_complex {
                let imag =
                    read_numbers::<B>(expect_element::<B>(&mut cursor, "imaginary part")?)?;
                ensure!(
                    imag.len() == num_elements,
                    "imaginary part of '{}' has a wrong length",
                    name
                );
                Some(imag)
            } else {
                None
            };
            ArrayData::Numeric { real, imag }
        }
        _ => {
            debug!("skip the content of '{}' of class {}", name, class);
            ArrayData::Unsupported
        }
    };

    Ok(Array {
        name,
        class,
        dims,
        data,
    })
}

/// Decode numbers of any storage type into `f64`.
fn read_numbers<B>(element: Element<'_>) -> Result<Vec<f64>>
where
    B: ByteOrder,
{
    let data_type = element.data_type()?;
    let bytes = element.data;
    let size = data_type
        .value_size()
        .ok_or_else(|| format_err!("data type {:?} does not hold numbers", data_type))?;
    ensure!(
        bytes.len() % size == 0,
        "{} bytes is not a multiple of the {:?} size",
        bytes.len(),
        data_type
    );

    let chunks = bytes.chunks_exact(size);
    let values: Vec<f64> = match data_type {
        DataType::Int8 => bytes.iter().map(|&byte| byte as i8 as f64).collect(),
        DataType::UInt8 => bytes.iter().map(|&byte| byte as f64).collect(),
        DataType::Int16 => chunks.map(|chunk| B::read_i16(chunk) as f64).collect(),
        DataType::UInt16 => chunks.map(|chunk| B::read_u16(chunk) as f64).collect(),
        DataType::Int32 => chunks.map(|chunk| B::read_i32(chunk) as f64).collect(),
        DataType::UInt32 => chunks.map(|chunk| B::read_u32(chunk) as f64).collect(),
        DataType::Int64 => chunks.map(|chunk| B::read_i64(chunk) as f64).collect(),
        DataType::UInt64 => chunks.map(|chunk| B::read_u64(chunk) as f64).collect(),
        DataType::Single => chunks.map(|chunk| B::read_f32(chunk) as f64).collect(),
        DataType::Double => chunks.map(B::read_f64).collect(),
        other => bail!("data type {:?} does not hold numbers", other),
    };
    Ok(values)
}

fn read_chars<B>(element: Element<'_>) -> Result<Vec<char>>
where
    B: ByteOrder,
{
    let bytes = element.data;
    let chars: Vec<char> = match element.data_type()? {
        DataType::Utf8 | DataType::UInt8 | DataType::Int8 => {
            std::str::from_utf8(bytes)?.chars().collect()
        }
        DataType::Utf16 | DataType::UInt16 => {
            ensure!(bytes.len() % 2 == 0, "odd number of UTF-16 bytes");
            let units: Vec<u16> = bytes.chunks_exact(2).map(B::read_u16).collect();
            String::from_utf16(&units)?.chars().collect()
        }
        DataType::Utf32 | DataType::UInt32 | DataType::Int32 => {
            ensure!(bytes.len() % 4 == 0, "truncated UTF-32 data");
            bytes
                .chunks_exact(4)
                .map(|chunk| {
                    let code = B::read_u32(chunk);
                    char::from_u32(code)
                        .ok_or_else(|| format_err!("invalid code point {:#x}", code))
                })
                .try_collect()?
        }
        other => bail!("data type {:?} does not hold characters", other),
    };
    Ok(chars)
}
