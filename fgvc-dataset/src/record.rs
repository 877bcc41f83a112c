use crate::common::*;

/// An image file found during discovery, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Zero-based class id.
    pub label: usize,
    /// Base name of the image file.
    pub name: String,
}

/// The decoded images, labels and file names of one dataset split.
///
/// The three sequences always have the same length, and index `i` of each
/// refers to the same sample.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheRecord {
    images: Vec<Array3<u8>>,
    labels: Vec<usize>,
    names: Vec<String>,
}

impl CacheRecord {
    pub fn new(images: Vec<Array3<u8>>, labels: Vec<usize>, names: Vec<String>) -> Result<Self> {
        ensure!(
            images.len() == labels.len() && labels.len() == names.len(),
            "the numbers of images ({}), labels ({}) and names ({}) must be equal",
            images.len(),
            labels.len(),
            names.len()
        );
        Ok(Self {
            images,
            labels,
            names,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Image arrays in `(height, width, channels)` layout.
    pub fn images(&self) -> &[Array3<u8>] {
        &self.images
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, index: usize) -> Option<(&Array3<u8>, usize, &str)> {
        let image = self.images.get(index)?;
        Some((image, self.labels[index], &self.names[index]))
    }
}

/// One sample served by a dataset view.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: DynamicImage,
    pub label: usize,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_unequal_lengths() {
        let image = Array3::<u8>::zeros((2, 2, 3));
        assert!(CacheRecord::new(vec![image.clone()], vec![0, 1], vec!["a".into()]).is_err());
        assert!(CacheRecord::new(vec![image], vec![0], vec![]).is_err());
    }

    #[test]
    fn parallel_access() {
        let images = vec![Array3::zeros((1, 1, 1)), Array3::from_elem((2, 1, 3), 9)];
        let record = CacheRecord::new(images, vec![4, 7], vec!["a.jpg".into(), "b.jpg".into()])
            .unwrap();
        assert_eq!(record.len(), 2);

        let (image, label, name) = record.get(1).unwrap();
        assert_eq!(image.dim(), (2, 1, 3));
        assert_eq!(label, 7);
        assert_eq!(name, "b.jpg");
        assert!(record.get(2).is_none());
        assert!(CacheRecord::default().is_empty());
    }
}
