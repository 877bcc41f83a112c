//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use derivative::Derivative;
pub use image::{
    imageops::FilterType, DynamicImage, GenericImageView as _, GrayAlphaImage, GrayImage,
    RgbImage, RgbaImage,
};
pub use itertools::{izip, Itertools as _};
pub use log::{debug, info, warn};
pub use ndarray::{Array3, ArrayView3};
pub use serde::{Deserialize, Serialize};
pub use std::{
    convert::TryFrom,
    fmt::{self, Debug},
    fs::{self, File},
    io::{self, BufWriter, Write as _},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};
