//! Image transforms applied when samples are served.

use crate::common::*;

/// Converts an image into another image.
pub trait Transform
where
    Self: Send + Sync,
{
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage>;
}

impl<F> Transform for F
where
    F: Fn(DynamicImage) -> Result<DynamicImage> + Send + Sync,
{
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        self(image)
    }
}

/// Returns the image unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        Ok(image)
    }
}

/// Converts any color layout to 8-bit RGB.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToRgb;

impl Transform for ToRgb {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(image.into_rgb8()))
    }
}

/// Resizes to an exact size, ignoring the aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    pub height: NonZeroUsize,
    pub width: NonZeroUsize,
    pub filter: FilterType,
}

impl Resize {
    pub fn new(height: usize, width: usize) -> Result<Self> {
        let height =
            NonZeroUsize::new(height).ok_or_else(|| format_err!("height must be positive"))?;
        let width =
            NonZeroUsize::new(width).ok_or_else(|| format_err!("width must be positive"))?;
        Ok(Self {
            height,
            width,
            filter: FilterType::Triangle,
        })
    }
}

impl Transform for Resize {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        let height = u32::try_from(self.height.get())?;
        let width = u32::try_from(self.width.get())?;
        Ok(image.resize_exact(width, height, self.filter))
    }
}

/// Crops the central region. Images smaller than the region are an error.
#[derive(Debug, Clone, Copy)]
pub struct CenterCrop {
    pub height: NonZeroUsize,
    pub width: NonZeroUsize,
}

impl CenterCrop {
    pub fn new(height: usize, width: usize) -> Result<Self> {
        let height =
            NonZeroUsize::new(height).ok_or_else(|| format_err!("height must be positive"))?;
        let width =
            NonZeroUsize::new(width).ok_or_else(|| format_err!("width must be positive"))?;
        Ok(Self { height, width })
    }
}

impl Transform for CenterCrop {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        let (image_w, image_h) = image.dimensions();
        let crop_h = u32::try_from(self.height.get())?;
        let crop_w = u32::try_from(self.width.get())?;
        ensure!(
            crop_h <= image_h && crop_w <= image_w,
            "cannot crop {}x{} out of a {}x{} image",
            crop_h,
            crop_w,
            image_h,
            image_w
        );

        let top = (image_h - crop_h) / 2;
        let left = (image_w - crop_w) / 2;
        Ok(image.crop_imm(left, top, crop_w, crop_h))
    }
}

/// Mirrors the image left to right.
#[derive(Debug, Clone, Copy, Default)]
pub struct HorizontalFlip;

impl Transform for HorizontalFlip {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        Ok(image.fliph())
    }
}

/// Applies transforms in order.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct Compose {
    #[derivative(Debug = "ignore")]
    transforms: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<T>(mut self, transform: T) -> Self
    where
        T: 'static + Transform,
    {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for Compose {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage> {
        self.transforms
            .iter()
            .try_fold(image, |image, transform| transform.apply(image))
    }
}
