//! Cached loaders for fine-grained image classification datasets.
//!
//! A dataset split is decoded once into a cache file next to the dataset and
//! served from that file afterwards.

mod common;

pub mod cache;
pub mod config;
pub mod cub;
pub mod dataset;
pub mod decode;
pub mod dogs;
pub mod error;
pub mod record;
pub mod transform;

pub use cache::{BuildOutcome, CacheBuilder};
pub use config::{Config, DatasetConfig, DatasetKind, LoadPolicy, Split};
pub use cub::CubDataset;
pub use dataset::{CachedDataset, GenericDataset, RandomAccessDataset};
pub use dogs::DogsDataset;
pub use error::DatasetError;
pub use record::{CacheRecord, FileRecord, Sample};
pub use transform::Transform;

use crate::common::*;

/// Build the cache of the configured dataset if needed and open it.
pub fn open_dataset(config: &Config) -> Result<Box<dyn RandomAccessDataset>> {
    let Config { kind, ref dataset } = *config;
    let dataset: Box<dyn RandomAccessDataset> = match kind {
        DatasetKind::Cub => Box::new(CubDataset::new(dataset.clone())?),
        DatasetKind::Dogs => Box::new(DogsDataset::new(dataset.clone())?),
    };
    Ok(dataset)
}

/// Build the cache of the configured dataset without opening it.
pub fn prepare_dataset(config: &Config) -> Result<BuildOutcome> {
    match config.kind {
        DatasetKind::Cub => CubDataset::prepare(&config.dataset),
        DatasetKind::Dogs => DogsDataset::prepare(&config.dataset),
    }
}

/// The cache file location of the configured dataset.
pub fn cache_path(config: &Config) -> PathBuf {
    match config.kind {
        DatasetKind::Cub => CubDataset::cache_path(&config.dataset),
        DatasetKind::Dogs => DogsDataset::cache_path(&config.dataset),
    }
}
