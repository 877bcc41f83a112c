//! Dataset configuration format.

use crate::common::*;

/// A partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn from_is_train(is_train: bool) -> Self {
        if is_train {
            Self::Train
        } else {
            Self::Test
        }
    }

    pub fn is_train(&self) -> bool {
        matches!(self, Self::Train)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dataset view holds the cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Decode the whole cache into memory on open.
    Eager,
    /// Memory-map the cache and copy samples out on access.
    Lazy,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self::Eager
    }
}

impl FromStr for LoadPolicy {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let policy = match text {
            "eager" => Self::Eager,
            "lazy" => Self::Lazy,
            _ => bail!("invalid load policy '{}', expect 'eager' or 'lazy'", text),
        };
        Ok(policy)
    }
}

/// Supported dataset sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Caltech-UCSD Birds-200-2011, one directory per class.
    Cub,
    /// Stanford Dogs, listed by MAT-files.
    Dogs,
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let kind = match text {
            "cub" => Self::Cub,
            "dogs" => Self::Dogs,
            _ => bail!("dataset kind '{}' is not supported", text),
        };
        Ok(kind)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cub => f.write_str("cub"),
            Self::Dogs => f.write_str("dogs"),
        }
    }
}

/// Options shared by every dataset variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The dataset root directory.
    pub root: PathBuf,
    pub split: Split,
    /// Overrides the default cache file location.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Convert images to RGB before caching. The variant decides if unset.
    #[serde(default)]
    pub normalize_rgb: Option<bool>,
    #[serde(default)]
    pub load_policy: LoadPolicy,
    /// Draw a progress bar while building the cache.
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_show_progress() -> bool {
    true
}

impl DatasetConfig {
    pub fn new(root: impl Into<PathBuf>, split: Split) -> Self {
        Self {
            root: root.into(),
            split,
            cache_path: None,
            normalize_rgb: None,
            load_policy: LoadPolicy::default(),
            show_progress: default_show_progress(),
        }
    }

    pub fn with_cache_path(mut self, cache_path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(cache_path.into());
        self
    }

    pub fn with_normalize_rgb(mut self, normalize_rgb: bool) -> Self {
        self.normalize_rgb = Some(normalize_rgb);
        self
    }

    pub fn with_load_policy(mut self, load_policy: LoadPolicy) -> Self {
        self.load_policy = load_policy;
        self
    }

    pub fn with_show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// The configuration file selecting one dataset variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub kind: DatasetKind,
    pub dataset: DatasetConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_with_defaults() {
        let text = r#"{
            // comments are allowed in json5
            kind: "dogs",
            dataset: {
                root: "/data/stanford-dogs",
                split: "test",
            },
        }"#;
        let config: Config = json5::from_str(text).unwrap();
        assert_eq!(config.kind, DatasetKind::Dogs);
        assert_eq!(
            config.dataset,
            DatasetConfig::new("/data/stanford-dogs", Split::Test)
        );
    }

    #[test]
    fn parse_config_with_overrides() {
        let text = r#"{
            kind: "cub",
            dataset: {
                root: "/data/cub",
                split: "train",
                cache_path: "/tmp/cub.bin",
                normalize_rgb: true,
                load_policy: "lazy",
                show_progress: false,
            },
        }"#;
        let config: Config = json5::from_str(text).unwrap();
        let expect = DatasetConfig::new("/data/cub", Split::Train)
            .with_cache_path("/tmp/cub.bin")
            .with_normalize_rgb(true)
            .with_load_policy(LoadPolicy::Lazy)
            .with_show_progress(false);
        assert_eq!(config.dataset, expect);
    }

    #[test]
    fn split_flag() {
        assert_eq!(Split::from_is_train(true), Split::Train);
        assert_eq!(Split::from_is_train(false).as_str(), "test");
        assert!(Split::Train.is_train());
    }

    #[test]
    fn parse_names() {
        assert_eq!("cub".parse::<DatasetKind>().unwrap(), DatasetKind::Cub);
        assert!("imagenet".parse::<DatasetKind>().is_err());
        assert_eq!("lazy".parse::<LoadPolicy>().unwrap(), LoadPolicy::Lazy);
        assert!("".parse::<LoadPolicy>().is_err());
    }
}
