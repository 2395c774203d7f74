//! Integration tests for the extract, transform and load stages
//!
//! These tests run the stages end to end against a temporary staging
//! directory and embedded databases.

use eyre::Result;
use serial_test::serial;
use stagehand::credentials::{CredentialSource, Credentials};
use stagehand::error::{EtlError, classify};
use stagehand::etl::{Extractor, Loader, Transformer};
use stagehand::load::{self, Backend, DuckDbSink, LoadRequest};
use stagehand::storage::StagingStore;
use stagehand::table::{Cell, Column, Table};
use stagehand::transform::{MissingDropper, RowFilter, TransformOptions, transform_staged};
use stagehand::{DirectoryExtractor, FileExtractor};
use tempfile::TempDir;

/// Mock extractor that produces in-memory tables
struct MockTableExtractor {
    tables: Vec<Table>,
}

impl Extractor for MockTableExtractor {
    type Item = Table;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        Ok(self.tables.clone())
    }
}

fn readings() -> Table {
    Table::try_new(vec![
        Column::new(
            "sensor",
            vec![
                Cell::Str("a".into()),
                Cell::Str("b".into()),
                Cell::Str("a".into()),
            ],
        ),
        Column::new("value", vec![Cell::Float(1.5), Cell::Null, Cell::Float(2.0)]),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_filter_scenario() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("letters.csv");
    std::fs::write(&source, "a,b\n1,x\n2,y\n3,x\n")?;
    let store = StagingStore::new(temp_dir.path().join("stage"));

    FileExtractor::new(store.clone(), &source).extract().await?;
    let options = TransformOptions {
        filter_column: Some("b".to_string()),
        filter_value: Some("x".to_string()),
        ..Default::default()
    };
    let staged = transform_staged(&store, "letters.csv", &options)?;

    let output = store.get(&staged.name)?;
    assert_eq!(staged.name, "transformed_letters.csv");
    assert_eq!(output.num_rows(), 2, "Only rows with b == x should remain");
    assert_eq!(output.column("a").unwrap().values, vec![Cell::Int(1), Cell::Int(3)]);

    Ok(())
}

#[test]
fn test_transform_missing_staged_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = StagingStore::new(temp_dir.path());

    let err = transform_staged(&store, "ghost.csv", &TransformOptions::default()).unwrap_err();
    assert!(matches!(classify(&err), Some(EtlError::NotFound(_))));
    assert!(!store.contains("transformed_ghost.csv"));
    assert!(store.list()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_csv_to_parquet_and_back() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = temp_dir.path().join("sales.csv");
    std::fs::write(&source, "id,region,amount\n1,north,10.5\n2,south,\n3,,7.25\n")?;
    let store = StagingStore::new(temp_dir.path().join("stage"));

    FileExtractor::new(store.clone(), &source).extract().await?;
    let table = store.get("sales.csv")?;
    store.put("sales.parquet", &table)?;
    let back = store.get("sales.parquet")?;

    assert_eq!(back.num_rows(), 3);
    assert_eq!(back.column_names(), vec!["id", "region", "amount"]);
    assert_eq!(back, table);

    Ok(())
}

#[tokio::test]
async fn test_directory_extract_skips_unsupported() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let input = temp_dir.path().join("input");
    std::fs::create_dir_all(&input)?;
    std::fs::write(input.join("one.csv"), "x\n1\n2\n")?;
    std::fs::write(input.join("two.json"), r#"{"y": [true, false]}"#)?;
    std::fs::write(input.join("readme.md"), "# not data")?;
    let store = StagingStore::new(temp_dir.path().join("stage"));

    let staged = DirectoryExtractor::new(store.clone(), &input).extract().await?;

    assert_eq!(staged.len(), 2);
    assert_eq!(store.get("two.json")?.column("y").unwrap().values[0], Cell::Bool(true));

    Ok(())
}

#[tokio::test]
async fn test_transformers_into_duckdb() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = temp_dir.path().join("readings.duckdb");

    let extractor = MockTableExtractor {
        tables: vec![readings()],
    };
    let dropper = MissingDropper;
    let filter = RowFilter::new("sensor", "a");
    let loader: Box<dyn Loader> = Box::new(DuckDbSink::new(&file, "readings"));

    let mut written = 0;
    for table in extractor.extract().await? {
        let table = filter.transform(dropper.transform(table)?)?;
        written += loader.load(&table).await?;
    }

    assert_eq!(written, 2);
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_sqlite_load_replaces_table() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = StagingStore::new(temp_dir.path().join("stage"));
    let database = temp_dir.path().join("etl.sqlite");
    let supplied = || Credentials::new().with("database", database.to_str().unwrap());

    store.put("first.csv", &readings())?;
    store.put("second.csv", &readings().retain_rows(|i| i == 0))?;

    for (name, expected) in [("first.csv", 3), ("second.csv", 1)] {
        let report = load::load(
            &store,
            LoadRequest {
                path: name,
                backend: "sqlite",
                table: "readings",
                supplied: supplied(),
            },
            &CredentialSource::NonInteractive,
        )
        .await?;
        assert_eq!(report.rows_written, expected);
        assert_eq!(report.target, "sqlite -> readings");
    }

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_sqlite_load_into_relative_path_with_space() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = StagingStore::new(temp_dir.path().join("stage"));
    store.put("data.csv", &readings())?;

    let previous = std::env::current_dir()?;
    std::env::set_current_dir(temp_dir.path())?;
    let result = load::load(
        &store,
        LoadRequest {
            path: "data.csv",
            backend: "sqlite",
            table: "readings",
            supplied: Credentials::new().with("database", "my data.sqlite"),
        },
        &CredentialSource::NonInteractive,
    )
    .await;
    std::env::set_current_dir(previous)?;

    assert_eq!(result?.rows_written, 3);
    assert!(temp_dir.path().join("my data.sqlite").is_file());

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_load_without_credentials_names_fields() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = StagingStore::new(temp_dir.path());
    store.put("data.csv", &readings())?;
    for field in Backend::Postgres.credential_fields() {
        // SAFETY: tests touching the environment run serially
        unsafe { std::env::remove_var(field.env_var()) };
    }

    let err = load::load(
        &store,
        LoadRequest {
            path: "data.csv",
            backend: "postgres",
            table: "etl_data",
            supplied: Credentials::new(),
        },
        &CredentialSource::NonInteractive,
    )
    .await
    .unwrap_err();

    match classify(&err) {
        Some(EtlError::MissingCredentials { backend, fields }) => {
            assert_eq!(backend, "postgres");
            assert_eq!(fields, &vec!["database", "user", "password"]);
        }
        other => panic!("Expected MissingCredentials, got {:?}", other),
    }

    Ok(())
}
