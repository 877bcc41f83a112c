//! The Caltech-UCSD Birds-200-2011 dataset.
//!
//! Each split directory contains one directory per class named
//! `<class id>.<species>`, for example `train/002.Laysan_Albatross/`, with the
//! images of that class inside.

use crate::{
    cache::{BuildOutcome, CacheBuilder},
    common::*,
    config::{DatasetConfig, Split},
    dataset::{CachedDataset, GenericDataset, RandomAccessDataset},
    error::DatasetError,
    record::{FileRecord, Sample},
    transform::Transform,
};

pub const CACHE_FILE_NAME: &str = "data_label_pair.bin";

/// The CUB-200 dataset backed by a cache file.
#[derive(Debug)]
pub struct CubDataset {
    config: DatasetConfig,
    view: CachedDataset,
}

impl CubDataset {
    /// Build the cache file if it is missing and open it.
    pub fn new(config: DatasetConfig) -> Result<Self> {
        Self::prepare(&config)?;
        let cache_path = Self::cache_path(&config);
        let view = CachedDataset::open(&cache_path, config.load_policy)?;
        Ok(Self { config, view })
    }

    pub fn with_transform<T>(mut self, transform: T) -> Self
    where
        T: 'static + Transform,
    {
        self.view = self.view.with_transform(transform);
        self
    }

    /// Build the cache file of the configured split unless it exists.
    pub fn prepare(config: &DatasetConfig) -> Result<BuildOutcome> {
        let DatasetConfig {
            ref root,
            split,
            normalize_rgb,
            show_progress,
            ..
        } = *config;

        CacheBuilder::new(Self::cache_path(config))
            .normalize_rgb(normalize_rgb.unwrap_or(false))
            .show_progress(show_progress)
            .build(|| Self::discover(root, split))
    }

    pub fn split_dir(root: &Path, split: Split) -> PathBuf {
        root.join(split.as_str())
    }

    pub fn default_cache_path(root: &Path, split: Split) -> PathBuf {
        Self::split_dir(root, split).join(CACHE_FILE_NAME)
    }

    pub fn cache_path(config: &DatasetConfig) -> PathBuf {
        config
            .cache_path
            .clone()
            .unwrap_or_else(|| Self::default_cache_path(&config.root, config.split))
    }

    /// List the samples of a split in sorted class and file order.
    pub fn discover(root: &Path, split: Split) -> Result<Vec<FileRecord>> {
        if !root.is_dir() {
            return Err(DatasetError::missing(root).into());
        }
        let split_dir = Self::split_dir(root, split);
        if !split_dir.is_dir() {
            return Err(DatasetError::missing(&split_dir).into());
        }

        let class_dirs: Vec<_> = sorted_entries(&split_dir)?
            .into_iter()
            .filter(|path| {
                let is_dir = path.is_dir();
                if !is_dir {
                    warn!("ignore '{}' outside of class directories", path.display());
                }
                is_dir
            })
            .collect();

        let mut records = vec![];

        for class_dir in class_dirs {
            let dir_name = file_name_str(&class_dir)?;
            let class_id = parse_class_prefix(dir_name)
                .with_context(|| format!("invalid class directory '{}'", class_dir.display()))?;
            let label = class_id - 1;

            let prev_len = records.len();
            for path in sorted_entries(&class_dir)? {
                if !path.is_file() {
                    debug!("skip non-file '{}'", path.display());
                    continue;
                }
                let name = file_name_str(&path)?.to_owned();
                records.push(FileRecord { path, label, name });
            }
            debug!(
                "found {} images in class {} '{}'",
                records.len() - prev_len,
                label,
                dir_name
            );
        }

        Ok(records)
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn view(&self) -> &CachedDataset {
        &self.view
    }

    pub fn into_view(self) -> CachedDataset {
        self.view
    }
}

impl GenericDataset for CubDataset {
    fn input_channels(&self) -> Option<usize> {
        self.view.input_channels()
    }
}

impl RandomAccessDataset for CubDataset {
    fn num_records(&self) -> usize {
        self.view.num_records()
    }

    fn nth(&self, index: usize) -> Result<Sample> {
        self.view.nth(index)
    }
}

/// Parse the 1-based class id in front of the first dot of a class
/// directory name.
pub fn parse_class_prefix(dir_name: &str) -> Result<usize> {
    let prefix = dir_name.split('.').next().unwrap_or(dir_name);
    ensure!(
        !prefix.is_empty() && prefix.bytes().all(|byte| byte.is_ascii_digit()),
        "'{}' does not start with a class number",
        dir_name
    );
    let class_id: usize = prefix
        .parse()
        .with_context(|| format!("'{}' does not start with a class number", dir_name))?;
    ensure!(class_id >= 1, "class numbers start from 1, but get '{}'", prefix);
    Ok(class_id)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to list directory '{}'", dir.display()))?
        .map(|entry| -> Result<_> { Ok(entry?.path()) })
        .try_collect()?;
    paths.sort();
    Ok(paths)
}

fn file_name_str(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format_err!("'{}' is not a valid UTF-8 file name", path.display()))
}
