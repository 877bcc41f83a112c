//! The cache file format and the one-shot cache builder.
//!
//! A cache file starts with a bincode-encoded prefix holding the magic tag
//! and one entry per sample, and continues with the raw pixel bytes of every
//! sample in index order.

use crate::{
    common::*,
    decode,
    error::DatasetError,
    record::{CacheRecord, FileRecord},
};
use bincode::Options as _;
use indicatif::{ProgressBar, ProgressIterator as _, ProgressStyle};
use memmap2::Mmap;

pub const MAGIC: [u8; 8] = *b"fgvcache";

fn bincode_options() -> impl bincode::Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Prefix {
    magic: [u8; 8],
    entries: Vec<Entry>,
}

/// Location and metadata of one sample in a cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: u64,
    pub name: String,
    /// `[height, width, channels]`
    pub shape: [u32; 3],
    /// Byte offset from the start of the data section.
    pub offset: u64,
}

impl Entry {
    pub fn data_len(&self) -> usize {
        self.shape.iter().map(|&dim| dim as usize).product()
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        let [h, w, c] = self.shape;
        (h as usize, w as usize, c as usize)
    }
}

/// The entry table of a cache file and where its data section begins.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    pub entries: Vec<Entry>,
    pub data_offset: usize,
}

impl CacheLayout {
    /// Parse and validate the layout of the cache bytes.
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(bytes);
        let Prefix { magic, entries } = bincode_options()
            .with_limit(bytes.len() as u64)
            .deserialize_from(&mut cursor)
            .map_err(|err| {
                DatasetError::corrupt(path, format!("failed to decode entry table: {}", err))
            })?;

        if magic != MAGIC {
            return Err(DatasetError::corrupt(path, "file magic does not match").into());
        }

        let data_offset = cursor.position() as usize;
        let data_len = bytes.len() - data_offset;

        let mut expect_offset = 0usize;
        for (index, entry) in entries.iter().enumerate() {
            let [_, _, channels] = entry.shape;
            if !(1..=4).contains(&channels) {
                return Err(DatasetError::corrupt(
                    path,
                    format!("sample {} has {} channels", index, channels),
                )
                .into());
            }
            if entry.offset != expect_offset as u64 {
                return Err(DatasetError::corrupt(
                    path,
                    format!(
                        "sample {} starts at {}, expect {}",
                        index, entry.offset, expect_offset
                    ),
                )
                .into());
            }
            expect_offset = entry
                .shape
                .iter()
                .try_fold(1usize, |size, &dim| size.checked_mul(dim as usize))
                .and_then(|size| expect_offset.checked_add(size))
                .ok_or_else(|| {
                    DatasetError::corrupt(path, format!("sample {} is too large", index))
                })?;
        }

        if expect_offset != data_len {
            return Err(DatasetError::corrupt(
                path,
                format!(
                    "data section has {} bytes, but the entries describe {} bytes",
                    data_len, expect_offset
                ),
            )
            .into());
        }

        Ok(Self {
            entries,
            data_offset,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the pixels of sample `index` out of the cache bytes.
    pub fn image(&self, bytes: &[u8], index: usize) -> Result<Array3<u8>> {
        let entry = &self.entries[index];
        let begin = self.data_offset + entry.offset as usize;
        let end = begin + entry.data_len();
        let image = Array3::from_shape_vec(entry.dim(), bytes[begin..end].to_vec())?;
        Ok(image)
    }
}

/// Serialize a record into the cache format.
pub fn write_record<W>(record: &CacheRecord, mut writer: W) -> Result<()>
where
    W: io::Write,
{
    let mut offset = 0u64;
    let entries: Vec<_> = izip!(record.images(), record.labels(), record.names())
        .map(|(image, &label, name)| -> Result<_> {
            let (h, w, c) = image.dim();
            let entry = Entry {
                label: label as u64,
                name: name.clone(),
                shape: [u32::try_from(h)?, u32::try_from(w)?, u32::try_from(c)?],
                offset,
            };
            offset += image.len() as u64;
            Ok(entry)
        })
        .try_collect()?;

    let prefix = Prefix {
        magic: MAGIC,
        entries,
    };
    bincode_options().serialize_into(&mut writer, &prefix)?;

    for image in record.images() {
        let image = image.as_standard_layout();
        let bytes = image
            .as_slice()
            .ok_or_else(|| format_err!("image array is not contiguous"))?;
        writer.write_all(bytes)?;
    }

    writer.flush()?;
    Ok(())
}

/// Load a whole cache file into memory.
pub fn read_record(path: &Path) -> Result<CacheRecord> {
    let bytes = read_cache_bytes(path)?;
    let layout = CacheLayout::parse(path, &bytes)?;

    let images: Vec<_> = (0..layout.len())
        .map(|index| layout.image(&bytes, index))
        .try_collect()?;
    let labels: Vec<_> = layout
        .entries
        .iter()
        .map(|entry| entry.label as usize)
        .collect();
    let names: Vec<_> = layout
        .entries
        .into_iter()
        .map(|entry| entry.name)
        .collect();

    CacheRecord::new(images, labels, names)
}

fn read_cache_bytes(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(DatasetError::missing(path).into());
    }
    let bytes =
        fs::read(path).with_context(|| format!("failed to read cache file '{}'", path.display()))?;
    Ok(bytes)
}

/// Memory-map a cache file and parse its entry table only.
pub fn map_cache(path: &Path) -> Result<(Mmap, CacheLayout)> {
    if !path.is_file() {
        return Err(DatasetError::missing(path).into());
    }
    let file = File::open(path)
        .with_context(|| format!("failed to open cache file '{}'", path.display()))?;
    if file.metadata()?.len() == 0 {
        return Err(DatasetError::corrupt(path, "the file is empty").into());
    }

    // the cache is never modified after it is persisted
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map cache file '{}'", path.display()))?;
    let layout = CacheLayout::parse(path, &mmap)?;
    Ok((mmap, layout))
}

/// What a call to [CacheBuilder::build] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildOutcome {
    /// The cache file already existed and was left untouched.
    Reused,
    /// A new cache file was written.
    Built { num_samples: usize },
    /// Another builder persisted the same cache file first.
    Raced,
}

/// Builds a cache file once.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    cache_path: PathBuf,
    normalize_rgb: bool,
    show_progress: bool,
}

impl CacheBuilder {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: cache_path.into(),
            normalize_rgb: false,
            show_progress: false,
        }
    }

    pub fn normalize_rgb(mut self, normalize_rgb: bool) -> Self {
        self.normalize_rgb = normalize_rgb;
        self
    }

    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Build the cache unless the file exists.
    ///
    /// `discover` is only called when the cache is missing. The file is
    /// written to a temporary path and moved into place after every sample
    /// is decoded, and an existing file is never replaced.
    pub fn build<F>(&self, discover: F) -> Result<BuildOutcome>
    where
        F: FnOnce() -> Result<Vec<FileRecord>>,
    {
        let cache_path = &self.cache_path;

        if cache_path.is_file() {
            info!("cache file '{}' exists", cache_path.display());
            return Ok(BuildOutcome::Reused);
        }
        ensure!(
            !cache_path.exists(),
            "cache path '{}' exists but is not a file",
            cache_path.display()
        );

        let records = discover()?;
        info!(
            "building cache file '{}' from {} images",
            cache_path.display(),
            records.len()
        );

        let record = self.decode_records(&records)?;
        self.persist(&record)
    }

    fn decode_records(&self, records: &[FileRecord]) -> Result<CacheRecord> {
        let progress = if self.show_progress {
            let style = ProgressStyle::with_template(
                "{msg} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
            )?;
            ProgressBar::new(records.len() as u64)
                .with_style(style)
                .with_message("decoding")
        } else {
            ProgressBar::hidden()
        };

        let images: Vec<_> = records
            .iter()
            .progress_with(progress.clone())
            .map(|record| decode::decode_image(&record.path, self.normalize_rgb))
            .try_collect()?;
        progress.finish_and_clear();

        let labels = records.iter().map(|record| record.label).collect();
        let names = records.iter().map(|record| record.name.clone()).collect();
        CacheRecord::new(images, labels, names)
    }

    fn persist(&self, record: &CacheRecord) -> Result<BuildOutcome> {
        let cache_path = &self.cache_path;
        let cache_dir = match cache_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut tmp_file = tempfile::Builder::new()
            .prefix(".fgvcache-")
            .suffix(".tmp")
            .tempfile_in(cache_dir)
            .with_context(|| {
                format!(
                    "failed to create a temporary file in '{}'",
                    cache_dir.display()
                )
            })?;
        write_record(record, BufWriter::new(tmp_file.as_file_mut()))?;
        tmp_file.as_file().sync_all()?;

        match tmp_file.persist_noclobber(cache_path) {
            Ok(_) => {
                info!(
                    "wrote {} samples to cache file '{}'",
                    record.len(),
                    cache_path.display()
                );
                Ok(BuildOutcome::Built {
                    num_samples: record.len(),
                })
            }
            Err(err)
                if err.error.kind() == io::ErrorKind::AlreadyExists && cache_path.is_file() =>
            {
                warn!(
                    "cache file '{}' was created by another builder, discard this build",
                    cache_path.display()
                );
                Ok(BuildOutcome::Raced)
            }
            Err(err) => Err(err.error).with_context(|| {
                format!("failed to persist cache file '{}'", cache_path.display())
            }),
        }
    }
}
