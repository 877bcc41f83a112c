//! The Stanford Dogs dataset.
//!
//! The split is described by `lists/train_list.mat` or `lists/test_list.mat`,
//! each holding a `file_list` cell array of image paths relative to
//! `images/Images/` and a `labels` array of 1-based class ids.

use crate::{
    cache::{BuildOutcome, CacheBuilder},
    common::*,
    config::{DatasetConfig, Split},
    dataset::{CachedDataset, GenericDataset, RandomAccessDataset},
    error::DatasetError,
    record::{FileRecord, Sample},
    transform::Transform,
};
use mat5::MatFile;

/// One row of a list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Image path relative to the image directory.
    pub file: String,
    /// 1-based class id.
    pub class_id: usize,
}

/// The Stanford Dogs dataset backed by a cache file.
#[derive(Debug)]
pub struct DogsDataset {
    config: DatasetConfig,
    view: CachedDataset,
}

impl DogsDataset {
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
            .normalize_rgb(normalize_rgb.unwrap_or(true))
            .show_progress(show_progress)
            .build(|| Self::discover(root, split))
    }

    pub fn list_file(root: &Path, split: Split) -> PathBuf {
        root.join("lists").join(format!("{}_list.mat", split))
    }

    pub fn image_dir(root: &Path) -> PathBuf {
        root.join("images").join("Images")
    }

    pub fn default_cache_path(root: &Path, split: Split) -> PathBuf {
        root.join(format!("cache_{}_data_label_name.bin", split))
    }

    pub fn cache_path(config: &DatasetConfig) -> PathBuf {
        config
            .cache_path
            .clone()
            .unwrap_or_else(|| Self::default_cache_path(&config.root, config.split))
    }

    /// Read the entries of a list file.
    pub fn load_list(list_file: &Path) -> Result<Vec<ListEntry>> {
        if !list_file.is_file() {
            return Err(DatasetError::missing(list_file).into());
        }
        let mat = MatFile::open(list_file)?;
        parse_list(&mat).with_context(|| format!("malformed list file '{}'", list_file.display()))
    }

    /// List the samples of a split in list file order.
    pub fn discover(root: &Path, split: Split) -> Result<Vec<FileRecord>> {
        if !root.is_dir() {
            return Err(DatasetError::missing(root).into());
        }
        let entries = Self::load_list(&Self::list_file(root, split))?;
        let image_dir = Self::image_dir(root);

        let records: Vec<_> = entries
            .into_iter()
            .map(|entry| -> Result<_> {
                let ListEntry { file, class_id } = entry;
                let path = image_dir.join(&file);
                let name = Path::new(&file)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| format_err!("list entry '{}' has no file name", file))?
                    .to_owned();
                Ok(FileRecord {
                    path,
                    label: class_id - 1,
                    name,
                })
            })
            .try_collect()?;

        debug!(
            "found {} images in '{}'",
            records.len(),
            Self::list_file(root, split).display()
        );
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

impl GenericDataset for DogsDataset {
    fn input_channels(&self) -> Option<usize> {
        self.view.input_channels()
    }
}

impl RandomAccessDataset for DogsDataset {
    fn num_records(&self) -> usize {
        self.view.num_records()
    }

    fn nth(&self, index: usize) -> Result<Sample> {
        self.view.nth(index)
    }
}

fn parse_list(mat: &MatFile) -> Result<Vec<ListEntry>> {
    let files: Vec<_> = mat
        .require("file_list")?
        .as_cells()?
        .iter()
        .map(|cell| cell.as_string())
        .try_collect()?;
    let labels = mat.require("labels")?.as_numbers()?;
    ensure!(
        files.len() == labels.len(),
        "file_list has {} entries, but labels has {}",
        files.len(),
        labels.len()
    );

    izip!(files, labels)
        .enumerate()
        .map(|(index, (file, &value))| -> Result<_> {
            let class_id = parse_class_id(value)
                .with_context(|| format!("invalid label at entry {}", index))?;
            Ok(ListEntry { file, class_id })
        })
        .try_collect()
}

fn parse_class_id(value: f64) -> Result<usize> {
    ensure!(
        value.is_finite() && value.fract() == 0.0,
        "label {} is not an integer",
        value
    );
    ensure!(value >= 1.0, "labels start from 1, but get {}", value);
    Ok(value as usize)
}
