//! Read-only views over cache files.

use crate::{
    cache::{self, CacheLayout},
    common::*,
    config::LoadPolicy,
    decode,
    error::DatasetError,
    record::{CacheRecord, Sample},
    transform::Transform,
};
use memmap2::Mmap;

/// The generic dataset trait.
pub trait GenericDataset
where
    Self: Debug + Send + Sync,
{
    /// The number of color channels shared by every sample, if any.
    fn input_channels(&self) -> Option<usize>;
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: GenericDataset,
{
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    fn nth(&self, index: usize) -> Result<Sample>;

    fn is_empty(&self) -> bool {
        self.num_records() == 0
    }
}

#[derive(Debug)]
enum Storage {
    Eager(CacheRecord),
    Lazy {
        mmap: Mmap,
        layout: CacheLayout,
        labels: Vec<usize>,
        names: Vec<String>,
    },
}

/// A dataset served from a cache file.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CachedDataset {
    cache_path: PathBuf,
    storage: Storage,
    input_channels: Option<usize>,
    #[derivative(Debug = "ignore")]
    transform: Option<Box<dyn Transform>>,
}

impl CachedDataset {
    /// Open an existing cache file. The file is never rebuilt here.
    pub fn open(cache_path: impl AsRef<Path>, policy: LoadPolicy) -> Result<Self> {
        let cache_path = cache_path.as_ref();

        let (storage, channels): (_, Vec<_>) = match policy {
            LoadPolicy::Eager => {
                let record = cache::read_record(cache_path)?;
                let channels = record.images().iter().map(|image| image.dim().2).collect();
                (Storage::Eager(record), channels)
            }
            LoadPolicy::Lazy => {
                let (mmap, layout) = cache::map_cache(cache_path)?;
                let channels = layout.entries.iter().map(|entry| entry.dim().2).collect();
                let labels = layout
                    .entries
                    .iter()
                    .map(|entry| entry.label as usize)
                    .collect();
                let names = layout
                    .entries
                    .iter()
                    .map(|entry| entry.name.clone())
                    .collect();
                let storage = Storage::Lazy {
                    mmap,
                    layout,
                    labels,
                    names,
                };
                (storage, channels)
            }
        };
        let input_channels = channels.into_iter().dedup().exactly_one().ok();

        let dataset = Self {
            cache_path: cache_path.to_owned(),
            storage,
            input_channels,
            transform: None,
        };
        debug!(
            "opened cache file '{}' with {} samples",
            cache_path.display(),
            dataset.num_records()
        );
        Ok(dataset)
    }

    /// Apply `transform` to every image served by [RandomAccessDataset::nth].
    pub fn with_transform<T>(mut self, transform: T) -> Self
    where
        T: 'static + Transform,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn labels(&self) -> &[usize] {
        match &self.storage {
            Storage::Eager(record) => record.labels(),
            Storage::Lazy { labels, .. } => labels,
        }
    }

    pub fn names(&self) -> &[String] {
        match &self.storage {
            Storage::Eager(record) => record.names(),
            Storage::Lazy { names, .. } => names,
        }
    }

    pub fn label(&self, index: usize) -> Option<usize> {
        self.labels().get(index).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names().get(index).map(|name| name.as_str())
    }

    /// The in-memory record. Only eagerly loaded datasets have one.
    pub fn record(&self) -> Option<&CacheRecord> {
        match &self.storage {
            Storage::Eager(record) => Some(record),
            Storage::Lazy { .. } => None,
        }
    }

    /// Get the raw pixel array of the nth sample without the transform.
    pub fn nth_array(&self, index: usize) -> Result<Array3<u8>> {
        self.check_index(index)?;
        match &self.storage {
            Storage::Eager(record) => Ok(record.images()[index].clone()),
            Storage::Lazy { mmap, layout, .. } => layout.image(mmap, index),
        }
    }

    /// Iterate over every sample in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.num_records()).map(move |index| self.nth(index))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.num_records();
        if index >= len {
            return Err(DatasetError::OutOfRange { index, len }.into());
        }
        Ok(())
    }
}

impl GenericDataset for CachedDataset {
    fn input_channels(&self) -> Option<usize> {
        self.input_channels
    }
}

impl RandomAccessDataset for CachedDataset {
    fn num_records(&self) -> usize {
        self.labels().len()
    }

    fn nth(&self, index: usize) -> Result<Sample> {
        let image = match &self.storage {
            Storage::Eager(record) => {
                self.check_index(index)?;
                decode::array_to_image(record.images()[index].view())?
            }
            Storage::Lazy { .. } => decode::array_to_image(self.nth_array(index)?.view())?,
        };
        let image = match &self.transform {
            Some(transform) => transform.apply(image)?,
            None => image,
        };

        Ok(Sample {
            image,
            label: self.labels()[index],
            name: self.names()[index].clone(),
        })
    }
}
