//! Delimited-file table persistence.
//!
//! Files carry the row index as their first column, with an empty header
//! when the index is positional. Reading with `index_col` restores a named
//! first column as the index; an unnamed one is positional and dropped.

use std::io::{Cursor, Read, Write};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

use super::{StorageConfig, StorageError, TableStore};
use crate::models::{nulls_as_float, Table};

/// Format used when a datetime cell is written out as text.
pub const DATETIME_FIELD_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Metadata written alongside a cached table.
///
/// Informational only; cache validity is decided by the table file alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub key: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub written_at: DateTime<Utc>,
    pub sha256: String,
}

/// Parse a delimited table.
///
/// Column types are inferred over every row. A column with no values at
/// all reads as float. With `index_col` the first column becomes the row
/// index; otherwise the table gets a positional index.
pub fn read_table<R: Read>(mut reader: R, index_col: bool) -> Result<Table, StorageError> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;

    let headers: Vec<String> = ::csv::Reader::from_reader(body.as_slice())
        .headers()?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Ok(Table::default());
    }

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(body))
        .finish()?;
    let mut frame = nulls_as_float(frame)?;

    if !index_col {
        return Ok(Table::new(frame));
    }

    // The reader invents a name for an empty header, so go by position.
    let first = frame
        .get_column_names()
        .first()
        .map(|name| name.to_string())
        .unwrap_or_default();
    match headers[0].as_str() {
        "" => {
            frame.drop_in_place(&first)?;
            Ok(Table::new(frame))
        }
        name => {
            if first != name {
                frame.rename(&first, name.into())?;
            }
            Ok(Table::with_index(frame, name)?)
        }
    }
}

/// Write a table with its index as the first column.
///
/// Floats always carry a decimal point and nulls are empty fields.
pub fn write_table<W: Write>(table: &Table, writer: W) -> Result<(), StorageError> {
    let frame = datetimes_as_text(table.frame())?;
    let positional = table.index_name().is_none();
    let mut wtr = ::csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = Vec::with_capacity(frame.width() + 1);
    if positional {
        header.push("");
    }
    header.extend(frame.get_column_names().into_iter().map(|n| n.as_str()));
    wtr.write_record(&header)?;

    for row in 0..frame.height() {
        let mut fields = Vec::with_capacity(header.len());
        if positional {
            fields.push(row.to_string());
        }
        for column in frame.get_columns() {
            fields.push(column.get(row).map(|v| format_any_value(&v))?);
        }
        wtr.write_record(&fields)?;
    }

    wtr.flush()?;
    Ok(())
}

fn datetimes_as_text(frame: &DataFrame) -> Result<DataFrame, StorageError> {
    let formats: Vec<Expr> = frame
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::Datetime(_, _) | DataType::Date))
        .map(|c| col(c.name().clone()).dt().to_string(DATETIME_FIELD_FORMAT))
        .collect();
    if formats.is_empty() {
        return Ok(frame.clone());
    }
    Ok(frame.clone().lazy().with_columns(formats).collect()?)
}

/// Format a cell as a CSV field.
fn format_any_value(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Boolean(true) => "True".to_string(),
        AnyValue::Boolean(false) => "False".to_string(),
        AnyValue::Float64(f) => format_float(*f),
        AnyValue::Float32(f) => format_float(f64::from(*f)),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

/// Table store backed by one CSV file per key.
#[derive(Debug, Clone)]
pub struct CsvTableStore {
    config: StorageConfig,
}

impl CsvTableStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Read the metadata sidecar for `key`, if one was written.
    pub async fn metadata(&self, key: &str) -> Result<Option<TableMetadata>, StorageError> {
        let path = self.config.meta_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn write_metadata(
        &self,
        key: &str,
        table: &Table,
        body: &[u8],
    ) -> Result<(), StorageError> {
        let meta = TableMetadata {
            key: key.to_string(),
            rows: table.len(),
            columns: table.column_names().iter().map(|s| s.to_string()).collect(),
            written_at: Utc::now(),
            sha256: hex::encode(Sha256::digest(body)),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(self.config.meta_path(key), json).await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for CsvTableStore {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.config.table_path(key).exists())
    }

    async fn load(&self, key: &str) -> Result<Option<Table>, StorageError> {
        let path = self.config.table_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).await?;
        let table = read_table(bytes.as_slice(), true)?;
        debug!("Read {} rows from {:?}", table.len(), path);
        Ok(Some(table))
    }

    async fn save(&self, key: &str, table: &Table) -> Result<(), StorageError> {
        let mut body = Vec::new();
        write_table(table, &mut body)?;

        fs::create_dir_all(&self.config.data_dir).await?;
        let path = self.config.table_path(key);
        fs::write(&path, &body).await?;

        if self.config.write_metadata {
            self.write_metadata(key, table, &body).await?;
        }

        info!("Wrote {} rows to {:?}", table.len(), path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.config.table_path(key);
        let meta = self.config.meta_path(key);
        if meta.exists() {
            fs::remove_file(&meta).await?;
        }
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        info!("Removed {:?}", path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample() -> Table {
        Table::new(
            df!(
                "sale_id" => [1i64, 2],
                "item_price" => [2.0, 0.5],
                "sale_date" => [
                    "Mon, 01 Jan 2018 00:00:00 GMT",
                    "Tue, 02 Jan 2018 00:00:00 GMT"
                ],
                "note" => [None, Some("late")]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_write_table_layout() {
        let mut out = Vec::new();
        write_table(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(",sale_id,item_price,sale_date,note"));
        assert_eq!(
            lines.next(),
            Some("0,1,2.0,\"Mon, 01 Jan 2018 00:00:00 GMT\",")
        );
    }

    #[test]
    fn test_write_table_named_index_and_datetimes() {
        let mut table = Table::new(
            df!("date" => ["2006-01-01"], "wind" => [Some(1.0)], "ok" => [true]).unwrap(),
        );
        crate::prepare::parse_datetime_column(&mut table, "date", "%Y-%m-%d").unwrap();
        table.set_index("date").unwrap();

        let mut out = Vec::new();
        write_table(&table, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "date,wind,ok\n2006-01-01 00:00:00,1.0,True\n"
        );
    }

    #[test]
    fn test_read_table_named_first_column_is_index() {
        let csv = "sale_date,a,b\n5,1,x\n7,2,y\n";
        let table = read_table(csv.as_bytes(), true).unwrap();

        assert_eq!(table.index_name(), Some("sale_date"));
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(
            table
                .index_column()
                .unwrap()
                .i64()
                .unwrap()
                .into_iter()
                .collect::<Vec<_>>(),
            vec![Some(5), Some(7)]
        );
    }

    #[test]
    fn test_read_table_unnamed_first_column_is_positional() {
        let csv = ",a,b\n0,1,x\n1,2,y\n";
        let table = read_table(csv.as_bytes(), true).unwrap();

        assert_eq!(table.index_name(), None);
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_read_table_without_index_col() {
        let csv = "Date,Wind,Solar\n2006-01-01,,\n2006-01-02,12.5,\n";
        let table = read_table(csv.as_bytes(), false).unwrap();

        assert_eq!(table.column_names(), vec!["Date", "Wind", "Solar"]);
        assert_eq!(table.value(0, "Wind"), Some(AnyValue::Null));
        assert_eq!(table.column("Wind").unwrap().dtype(), &DataType::Float64);
        assert_eq!(table.column("Solar").unwrap().dtype(), &DataType::Float64);
        assert_eq!(table.column("Date").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_read_table_empty_body() {
        let table = read_table("".as_bytes(), true).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_write_then_read_preserves_table() {
        let table = sample();
        let mut out = Vec::new();
        write_table(&table, &mut out).unwrap();

        let read = read_table(out.as_slice(), true).unwrap();
        assert_eq!(read, table);
    }

    #[tokio::test]
    async fn test_store_load_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = CsvTableStore::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        assert!(!store.contains("items").await.unwrap());
        assert!(store.load("items").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_save_load_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = CsvTableStore::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        store.save("sales", &sample()).await.unwrap();
        assert!(temp_dir.path().join("sales.csv").exists());
        assert_eq!(store.load("sales").await.unwrap(), Some(sample()));

        assert!(store.remove("sales").await.unwrap());
        assert!(!store.remove("sales").await.unwrap());
        assert!(!store.contains("sales").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_writes_metadata_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::new(temp_dir.path().to_path_buf()).with_metadata(true);
        let store = CsvTableStore::new(config);

        store.save("items", &sample()).await.unwrap();
        let meta = store.metadata("items").await.unwrap().unwrap();

        assert_eq!(meta.key, "items");
        assert_eq!(meta.rows, 2);
        assert_eq!(meta.columns[0], "sale_id");
        assert_eq!(meta.sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_store_without_metadata_has_no_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let store = CsvTableStore::new(StorageConfig::new(temp_dir.path().to_path_buf()));

        store.save("items", &sample()).await.unwrap();
        assert!(store.metadata("items").await.unwrap().is_none());
    }
}
