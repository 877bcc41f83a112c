//! Conversions between image files, image objects and pixel arrays.

use crate::{common::*, error::DatasetError};

/// Decode an image file into a `(height, width, channels)` array.
///
/// The source channel layout is kept unless `normalize_rgb` is set, in which
/// case grayscale and alpha images are converted to three channels.
pub fn decode_image(path: &Path, normalize_rgb: bool) -> Result<Array3<u8>> {
    let image = image::open(path).map_err(|source| DatasetError::DecodeFailure {
        path: path.to_owned(),
        source,
    })?;
    image_to_array(image, normalize_rgb)
        .with_context(|| format!("failed to convert image '{}'", path.display()))
}

/// Convert an image into an 8-bit pixel array.
///
/// Sources with 16-bit or float channels are narrowed to 8 bits.
pub fn image_to_array(image: DynamicImage, normalize_rgb: bool) -> Result<Array3<u8>> {
    let (width, height) = image.dimensions();
    let channels = if normalize_rgb {
        3
    } else {
        image.color().channel_count()
    };

    let raw = match channels {
        1 => image.into_luma8().into_raw(),
        2 => image.into_luma_alpha8().into_raw(),
        3 => image.into_rgb8().into_raw(),
        _ => image.into_rgba8().into_raw(),
    };
    let channels = channels.min(4) as usize;

    let array = Array3::from_shape_vec((height as usize, width as usize, channels), raw)?;
    Ok(array)
}

/// Rebuild an image object from a pixel array.
pub fn array_to_image(array: ArrayView3<'_, u8>) -> Result<DynamicImage> {
    let (height, width, channels) = array.dim();
    let raw = array.as_standard_layout().into_owned().into_raw_vec();
    let (width, height) = (u32::try_from(width)?, u32::try_from(height)?);

    let image = match channels {
        1 => GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8),
        2 => GrayAlphaImage::from_raw(width, height, raw).map(DynamicImage::ImageLumaA8),
        3 => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8),
        _ => bail!("unsupported number of channels {}", channels),
    };
    image.ok_or_else(|| {
        format_err!(
            "pixel buffer does not fit a {}x{}x{} image",
            height,
            width,
            channels
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, LumaA, Rgba};

    #[test]
    fn keep_channel_layout() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, Luma([17])));
        let array = image_to_array(gray, false).unwrap();
        assert_eq!(array.dim(), (2, 3, 1));
        assert!(array.iter().all(|&value| value == 17));

        let gray_alpha =
            DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(1, 1, LumaA([5, 200])));
        let array = image_to_array(gray_alpha, false).unwrap();
        assert_eq!(array.dim(), (1, 1, 2));
        assert_eq!(array.as_slice().unwrap(), &[5, 200]);
    }

    #[test]
    fn normalize_to_rgb() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 5, Rgba([1, 2, 3, 128])));
        let array = image_to_array(rgba, true).unwrap();
        assert_eq!(array.dim(), (5, 4, 3));
        assert_eq!(&array.as_slice().unwrap()[0..3], &[1, 2, 3]);

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([9])));
        let array = image_to_array(gray, true).unwrap();
        assert_eq!(array.dim(), (2, 2, 3));
        assert!(array.iter().all(|&value| value == 9));
    }

    #[test]
    fn array_image_conversion() {
        let array = Array3::from_shape_fn((3, 2, 4), |(row, col, channel)| {
            (row * 100 + col * 10 + channel) as u8
        });
        let image = array_to_image(array.view()).unwrap();
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.color().channel_count(), 4);
        assert_eq!(image_to_array(image, false).unwrap(), array);

        // transposed views are copied into standard layout first
        let transposed = array.view().permuted_axes([1, 0, 2]);
        let image = array_to_image(transposed).unwrap();
        assert_eq!(image.dimensions(), (3, 2));

        assert!(array_to_image(Array3::zeros((1, 1, 5)).view()).is_err());
    }

    #[test]
    fn missing_file_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_image(&dir.path().join("absent.png"), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::DecodeFailure { .. })
        ));
    }
}
