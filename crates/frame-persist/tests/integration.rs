//! Black-box tests for the save/load facade
//!
//! Everything here goes through the top-level `save` and `load`.

use frame_persist::{
    CsvLoadOptions, CsvSaveOptions, FileLoadError, FileSaveError, Format, Header, LoadOptions,
    OpenMode, Representation, SaveOptions, load, save,
};
use polars::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup_test_df() -> DataFrame {
    df! {
        "name" => &["alice", "bob", "charlie"],
        "gold" => &[100i64, 250, 50],
        "ratio" => &[0.25f64, 0.5, 0.75],
    }
    .unwrap()
}

fn load_frame(path: &std::path::Path, options: &LoadOptions) -> DataFrame {
    load(path, options)
        .unwrap()
        .into_frame()
        .expect("expected a structured table")
}

// ============ Pickle ============

#[test]
fn pickle_structured_round_trip() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("entities.pkl");
    let df = setup_test_df();

    save(&path, &df, &SaveOptions::pickle(Representation::Structured)).unwrap();
    let loaded = load_frame(&path, &LoadOptions::pickle(Representation::Structured));

    assert_eq!(loaded.shape(), df.shape());
    assert_eq!(loaded.get_column_names(), df.get_column_names());
    assert!(loaded.equals(&df));
}

#[test]
fn pickle_raw_round_trip() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("matrix.pkl");
    let df = df! {
        "x" => &[1i32, 2, 3],
        "y" => &[0.5f64, 1.5, 2.5],
    }
    .unwrap();

    save(&path, &df, &SaveOptions::pickle(Representation::Raw)).unwrap();
    let arr = load(&path, &LoadOptions::pickle(Representation::Raw))
        .unwrap()
        .into_array()
        .unwrap();

    assert_eq!(arr.shape(), &[3, 2]);
    assert_eq!(arr[[2, 0]], 3.0);
    assert_eq!(arr[[1, 1]], 1.5);
}

// ============ Dispatcher ============

#[test]
fn saving_creates_missing_directories() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("a/b/c/entities.pkl");

    save(&path, &setup_test_df(), &SaveOptions::pickle(Representation::Structured)).unwrap();

    assert!(tmp.path().join("a/b/c").is_dir());
    assert!(path.is_file());
}

#[test]
fn overwrite_keeps_only_the_second_table() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("out.csv");
    let options = SaveOptions::csv(CsvSaveOptions::default()).with_mode(OpenMode::Overwrite);
    let first = setup_test_df();
    let second = df! { "gold" => &[7i64] }.unwrap();

    save(&path, &first, &options).unwrap();
    save(&path, &second, &options).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("alice"));
    let loaded = load_frame(&path, &LoadOptions::csv(CsvLoadOptions::new().with_dtype(None)));
    assert!(loaded.equals(&second));
}

#[test]
fn invalid_path_fails_to_save() {
    init_logging();
    let err = save("", &setup_test_df(), &SaveOptions::pickle(Representation::Structured))
        .unwrap_err();
    assert!(matches!(err, FileSaveError::InvalidPath(_)));
}

#[test]
fn legacy_format_strings_parse_or_fail() {
    assert_eq!("pickle".parse::<Format>().unwrap(), Format::Pickle);
    assert!("feather".parse::<Format>().is_err());
    assert_eq!("w".parse::<OpenMode>().unwrap(), OpenMode::Overwrite);
}

#[test]
fn options_load_from_json_config() {
    let options: SaveOptions =
        serde_json::from_str(r#"{"format": "csv", "mode": "overwrite", "separator": 59}"#).unwrap();
    assert_eq!(options.format(), Format::Csv);
    assert_eq!(options.mode, OpenMode::Overwrite);

    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("semi.csv");
    save(&path, &df! { "a" => &[1i64], "b" => &[2i64] }.unwrap(), &options).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "a;b\n1;2\n");
}

// ============ CSV ============

#[test]
fn csv_load_without_header_skipping_first_line() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("numbers.csv");
    std::fs::write(&path, "first,second\n10,20\n30,40\n").unwrap();

    let options = CsvLoadOptions::new()
        .with_header(Header::None)
        .with_dtype(Some(DataType::Float64))
        .with_skip_rows(1);
    let df = load_frame(&path, &LoadOptions::csv(options));

    assert_eq!(df.shape(), (2, 2));
    let first = &df.get_columns()[0];
    assert_eq!(first.dtype(), &DataType::Float64);
    assert_eq!(first.f64().unwrap().get(0), Some(10.0));
}

#[test]
fn csv_load_of_missing_file_fails() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let err = load(
        tmp.path().join("nope.csv"),
        &LoadOptions::csv(CsvLoadOptions::default()),
    )
    .unwrap_err();
    assert!(matches!(err, FileLoadError::NotFound(_)));
}

#[test]
fn csv_append_accumulates_rows() {
    init_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("log.csv");
    let options = SaveOptions::csv(CsvSaveOptions::default());

    save(&path, &setup_test_df(), &options).unwrap();
    save(&path, &setup_test_df(), &options).unwrap();

    let loaded = load_frame(&path, &LoadOptions::csv(CsvLoadOptions::new().with_dtype(None)));
    assert_eq!(loaded.height(), 6);
    assert_eq!(
        loaded.column("name").unwrap().str().unwrap().get(3),
        Some("alice")
    );
}
