use anyhow::Result;
use fgvc_dataset::{
    transform::{Compose, HorizontalFlip, Resize},
    CubDataset, DatasetConfig, DatasetError, GenericDataset, LoadPolicy, RandomAccessDataset,
    Split,
};
use image::{GenericImageView as _, GrayImage, Luma, Rgb, RgbImage};
use std::{fs, path::Path};

fn config(root: &Path, split: Split) -> DatasetConfig {
    let _ = pretty_env_logger::try_init();
    DatasetConfig::new(root, split).with_show_progress(false)
}

fn error_kind(err: &anyhow::Error) -> Option<&DatasetError> {
    err.downcast_ref::<DatasetError>()
}

/// Two classes with lossless images of different layouts.
fn make_png_tree(root: &Path) -> Result<()> {
    let albatross = root.join("train").join("001.Black_footed_Albatross");
    let tern = root.join("train").join("141.Artic_Tern");
    fs::create_dir_all(&albatross)?;
    fs::create_dir_all(&tern)?;

    RgbImage::from_fn(5, 4, |x, y| Rgb([x as u8 * 40, y as u8 * 60, 7]))
        .save(albatross.join("b.png"))?;
    RgbImage::from_pixel(3, 3, Rgb([200, 100, 50])).save(albatross.join("a.png"))?;
    GrayImage::from_fn(2, 6, |x, y| Luma([(x + y * 2) as u8])).save(tern.join("c.png"))?;
    Ok(())
}

#[test]
fn single_bird_jpeg() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let class_dir = root.join("train").join("002.Some_Bird");
    fs::create_dir_all(&class_dir)?;
    RgbImage::from_pixel(8, 6, Rgb([90, 160, 30])).save(class_dir.join("img1.jpg"))?;

    let dataset = CubDataset::new(config(root, Split::Train))?;
    assert_eq!(dataset.num_records(), 1);

    let sample = dataset.nth(0)?;
    assert_eq!(sample.label, 1);
    assert_eq!(sample.name, "img1.jpg");
    assert_eq!(sample.image.width(), 8);
    assert_eq!(sample.image.height(), 6);
    assert_eq!(sample.image.color().channel_count(), 3);

    assert!(root.join("train").join("data_label_pair.bin").is_file());
    Ok(())
}

#[test]
fn round_trip_labels_names_pixels() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;

    let dataset = CubDataset::new(config(root, Split::Train))?;
    let view = dataset.view();
    assert_eq!(view.labels(), &[0, 0, 140]);
    assert_eq!(view.names(), &["a.png", "b.png", "c.png"]);
    assert_eq!(dataset.input_channels(), None);

    let b = view.nth_array(1)?;
    assert_eq!(b.dim(), (4, 5, 3));
    assert_eq!(b[[3, 2, 0]], 80);
    assert_eq!(b[[3, 2, 1]], 180);
    assert_eq!(b[[3, 2, 2]], 7);

    // grayscale is kept as one channel unless RGB is requested
    let c = view.nth_array(2)?;
    assert_eq!(c.dim(), (6, 2, 1));
    assert_eq!(c[[5, 1, 0]], 11);
    assert_eq!(dataset.nth(2)?.image.color().channel_count(), 1);
    Ok(())
}

#[test]
fn normalize_rgb_on_request() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;

    let dataset = CubDataset::new(config(root, Split::Train).with_normalize_rgb(true))?;
    assert_eq!(dataset.input_channels(), Some(3));
    let c = dataset.view().nth_array(2)?;
    assert_eq!(c.dim(), (6, 2, 3));
    assert!(c.iter().all(|&value| value <= 11));
    Ok(())
}

#[test]
fn second_build_reuses_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;
    let cache_path = CubDataset::default_cache_path(root, Split::Train);

    let first = CubDataset::new(config(root, Split::Train))?;
    let bytes = fs::read(&cache_path)?;

    // the images are gone, so a rebuild would fail
    fs::remove_dir_all(root.join("train").join("141.Artic_Tern"))?;
    let outcome = CubDataset::prepare(&config(root, Split::Train))?;
    assert_eq!(outcome, fgvc_dataset::BuildOutcome::Reused);

    let second = CubDataset::new(config(root, Split::Train))?;
    assert_eq!(fs::read(&cache_path)?, bytes);
    assert_eq!(second.num_records(), first.num_records());
    assert_eq!(second.view().names(), first.view().names());
    Ok(())
}

#[test]
fn custom_cache_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("cub");
    make_png_tree(&root)?;
    let cache_path = dir.path().join("cub_train.bin");

    let dataset = CubDataset::new(config(&root, Split::Train).with_cache_path(&cache_path))?;
    assert_eq!(dataset.view().cache_path(), cache_path);
    assert!(cache_path.is_file());
    assert!(!CubDataset::default_cache_path(&root, Split::Train).exists());
    Ok(())
}

#[test]
fn empty_split() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    fs::create_dir_all(root.join("test"))?;

    let dataset = CubDataset::new(config(root, Split::Test))?;
    assert_eq!(dataset.num_records(), 0);
    assert!(dataset.is_empty());

    let err = dataset.nth(0).unwrap_err();
    assert!(matches!(
        error_kind(&err),
        Some(DatasetError::OutOfRange { index: 0, len: 0 })
    ));
    Ok(())
}

#[test]
fn index_past_the_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;

    let dataset = CubDataset::new(config(root, Split::Train))?;
    let err = dataset.nth(3).unwrap_err();
    assert!(matches!(
        error_kind(&err),
        Some(DatasetError::OutOfRange { index: 3, len: 3 })
    ));
    Ok(())
}

#[test]
fn eager_and_lazy_views_agree() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;

    let eager = CubDataset::new(config(root, Split::Train))?;
    let lazy = CubDataset::new(config(root, Split::Train).with_load_policy(LoadPolicy::Lazy))?;
    assert_eq!(eager.num_records(), lazy.num_records());

    for index in 0..eager.num_records() {
        assert_eq!(eager.view().nth_array(index)?, lazy.view().nth_array(index)?);
        assert_eq!(eager.nth(index)?.name, lazy.nth(index)?.name);
    }
    Ok(())
}

#[test]
fn transform_is_applied() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;

    let dataset = CubDataset::new(config(root, Split::Train))?
        .with_transform(Compose::new().then(Resize::new(8, 10)?).then(HorizontalFlip));
    for sample in dataset.view().iter() {
        let sample = sample?;
        assert_eq!(sample.image.width(), 10);
        assert_eq!(sample.image.height(), 8);
    }
    assert_eq!(dataset.nth(2)?.label, 140);
    Ok(())
}

#[test]
fn missing_root() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("absent");

    let err = CubDataset::new(config(&root, Split::Train)).unwrap_err();
    assert!(matches!(
        error_kind(&err),
        Some(DatasetError::MissingInput { .. })
    ));
    assert!(!root.exists());
    Ok(())
}

#[test]
fn undecodable_image() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;
    let class_dir = root.join("train").join("001.Black_footed_Albatross");
    fs::write(class_dir.join("broken.jpg"), b"not a jpeg")?;

    let err = CubDataset::new(config(root, Split::Train)).unwrap_err();
    assert!(matches!(
        error_kind(&err),
        Some(DatasetError::DecodeFailure { .. })
    ));
    assert!(!CubDataset::default_cache_path(root, Split::Train).exists());
    Ok(())
}

#[test]
fn bad_class_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    make_png_tree(root)?;
    fs::create_dir_all(root.join("train").join("000.Zero"))?;

    assert!(CubDataset::new(config(root, Split::Train)).is_err());
    assert!(!CubDataset::default_cache_path(root, Split::Train).exists());
    Ok(())
}
