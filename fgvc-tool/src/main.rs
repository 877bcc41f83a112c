use anyhow::{bail, Context, Result};
use fgvc_dataset::{
    cache, BuildOutcome, Config, DatasetConfig, DatasetKind, LoadPolicy, Sample, Split,
};
use itertools::Itertools;
use log::info;
use prettytable::{row, Table};
use std::{
    convert::TryFrom,
    env,
    path::{Path, PathBuf},
};
use structopt::StructOpt;

#[derive(Debug, Clone, StructOpt)]
/// Build and inspect caches of fine-grained classification datasets.
enum Args {
    /// Build the cache file of a dataset split if it does not exist
    Build {
        #[structopt(flatten)]
        source: SourceArgs,
    },
    /// Summarize a cache file
    Info {
        /// cache file
        cache_file: PathBuf,
    },
    /// Print one sample of a dataset split
    Show {
        #[structopt(flatten)]
        source: SourceArgs,
        /// sample index
        #[structopt(long, allow_hyphen_values = true)]
        index: i64,
    },
}

#[derive(Debug, Clone, StructOpt)]
struct SourceArgs {
    /// dataset configuration file, replaces the options below
    #[structopt(long)]
    config: Option<PathBuf>,
    /// dataset kind, 'cub' or 'dogs'
    #[structopt(long, required_unless = "config")]
    kind: Option<DatasetKind>,
    /// use the test split instead of the train split
    #[structopt(long)]
    test: bool,
    /// cache file location instead of the default one
    #[structopt(long)]
    cache_file: Option<PathBuf>,
    /// convert images to RGB before caching
    #[structopt(long)]
    rgb: bool,
    /// memory-map the cache instead of loading it
    #[structopt(long)]
    lazy: bool,
    /// dataset root directory
    #[structopt(required_unless = "config")]
    root: Option<PathBuf>,
}

impl SourceArgs {
    fn into_config(self) -> Result<Config> {
        let Self {
            config,
            kind,
            test,
            cache_file,
            rgb,
            lazy,
            root,
        } = self;

        if let Some(config_file) = config {
            let config = Config::open(&config_file).with_context(|| {
                format!("failed to load config file '{}'", config_file.display())
            })?;
            return Ok(config);
        }

        let (kind, root) = match (kind, root) {
            (Some(kind), Some(root)) => (kind, root),
            _ => bail!("either --config or both --kind and the dataset root must be given"),
        };

        let mut dataset = DatasetConfig::new(root, Split::from_is_train(!test));
        if let Some(cache_file) = cache_file {
            dataset = dataset.with_cache_path(cache_file);
        }
        if rgb {
            dataset = dataset.with_normalize_rgb(true);
        }
        if lazy {
            dataset = dataset.with_load_policy(LoadPolicy::Lazy);
        }

        Ok(Config { kind, dataset })
    }
}

fn main() -> Result<()> {
    init_logger();

    match Args::from_args() {
        Args::Build { source } => build(source.into_config()?)?,
        Args::Info { cache_file } => info(cache_file)?,
        Args::Show { source, index } => show(source.into_config()?, index)?,
    }

    Ok(())
}

fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn build(config: Config) -> Result<()> {
    let cache_path = fgvc_dataset::cache_path(&config);

    match fgvc_dataset::prepare_dataset(&config)? {
        BuildOutcome::Reused => info!("nothing to do, '{}' exists", cache_path.display()),
        BuildOutcome::Built { num_samples } => {
            info!("cached {} samples in '{}'", num_samples, cache_path.display())
        }
        BuildOutcome::Raced => info!("'{}' was built concurrently", cache_path.display()),
    }

    println!("{}", cache_path.display());
    Ok(())
}

fn info(cache_file: impl AsRef<Path>) -> Result<()> {
    info_table(cache_file.as_ref())?.printstd();
    Ok(())
}

fn info_table(cache_file: &Path) -> Result<Table> {
    let (_mmap, layout) = cache::map_cache(cache_file)?;
    let entries = &layout.entries;

    let label_range = entries
        .iter()
        .map(|entry| entry.label)
        .minmax()
        .into_option()
        .map(|(min, max)| format!("{} ..= {}", min, max))
        .unwrap_or_else(|| "-".to_string());
    let num_classes = entries.iter().map(|entry| entry.label).unique().count();
    let channels = entries
        .iter()
        .map(|entry| entry.shape[2])
        .counts()
        .into_iter()
        .sorted()
        .map(|(channels, count)| format!("{}ch: {}", channels, count))
        .join(", ");
    let num_bytes: usize = entries.iter().map(|entry| entry.data_len()).sum();

    let mut table = Table::new();
    table.add_row(row!["cache file", cache_file.display()]);
    table.add_row(row!["samples", entries.len()]);
    table.add_row(row!["classes", num_classes]);
    table.add_row(row!["labels", label_range]);
    table.add_row(row!["channels", channels]);
    table.add_row(row!["pixel bytes", num_bytes]);
    Ok(table)
}

fn show(config: Config, index: i64) -> Result<()> {
    let dataset = fgvc_dataset::open_dataset(&config)?;
    let index = sample_index(index, dataset.num_records())?;
    let sample = dataset.nth(index)?;
    sample_table(index, &sample).printstd();
    Ok(())
}

/// Convert a signed command line index, rejecting negative values.
fn sample_index(index: i64, num_records: usize) -> Result<usize> {
    match usize::try_from(index) {
        Ok(index) => Ok(index),
        Err(_) => bail!(
            "index {} is out of range for a dataset of {} samples",
            index,
            num_records
        ),
    }
}

fn sample_table(index: usize, sample: &Sample) -> Table {
    let image = &sample.image;
    let mut table = Table::new();
    table.add_row(row!["index", "label", "name", "height", "width", "channels"]);
    table.add_row(row![
        index,
        sample.label,
        sample.name,
        image.height(),
        image.width(),
        image.color().channel_count()
    ]);
    table
}
