use anyhow::Result;
use mat5::{Array, ArrayClass, MatFile, MatWriter};

const FILES: &[&str] = &[
    "n02085620-Chihuahua/n02085620_5927.jpg",
    "n02085782-Japanese_spaniel/n02085782_2874.jpg",
    "n02116738-African_hunting_dog/n02116738_10024.jpg",
];
const LABELS: &[f64] = &[1.0, 2.0, 120.0];

fn list_writer(compress: bool) -> MatWriter {
    let cells: Vec<_> = FILES.iter().map(|path| Array::char_row("", path)).collect();
    let mut writer = MatWriter::new().compress(compress);
    writer
        .push(Array::cell("file_list", vec![FILES.len(), 1], cells))
        .push(Array::numeric(
            "labels",
            vec![LABELS.len(), 1],
            LABELS.to_vec(),
        ));
    writer
}

fn check_list(file: &MatFile) -> Result<()> {
    let file_list = file.require("file_list")?;
    assert_eq!(file_list.class, ArrayClass::Cell);
    assert_eq!(file_list.dims, vec![3, 1]);

    let paths: Vec<String> = file_list
        .as_cells()?
        .iter()
        .map(|cell| cell.as_string())
        .collect::<Result<_>>()?;
    assert_eq!(paths, FILES);

    let labels = file.require("labels")?;
    assert_eq!(labels.as_numbers()?, LABELS);

    let names: Vec<_> = file.arrays().map(|array| array.name.as_str()).collect();
    assert_eq!(names, vec!["file_list", "labels"]);
    Ok(())
}

#[test]
fn read_plain_list_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("train_list.mat");
    list_writer(false).write(&path)?;

    check_list(&MatFile::open(&path)?)
}

#[test]
fn read_compressed_list_file() -> Result<()> {
    let bytes = list_writer(true).to_bytes()?;
    // compressed variables are smaller than their plain encoding
    assert!(bytes.len() < list_writer(false).to_bytes()?.len());

    check_list(&MatFile::from_bytes(&bytes)?)
}

#[test]
fn non_ascii_characters() -> Result<()> {
    let mut writer = MatWriter::new();
    writer.push(Array::char_row("city", "Málaga"));
    let file = MatFile::from_bytes(&writer.to_bytes()?)?;
    assert_eq!(file.require("city")?.as_string()?, "Málaga");
    Ok(())
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(MatFile::open(dir.path().join("absent.mat")).is_err());
}
