use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dbstudio_core::loader::{ResultRowStream, ResultSource, SourceError};
use dbstudio_core::matrix::{CellValue, ColumnDefinition, ColumnType, ResultSet};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to read results payload at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse results payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("results payload contains no result")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ResultStats {
    #[serde(default)]
    pub rows_read: u64,
    #[serde(default)]
    pub rows_written: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResult {
    pub result_set: ResultSet,
    pub stats: ResultStats,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    meta: ResultStats,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResults {
    Many(Vec<RawResult>),
    One(RawResult),
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    result: RawResults,
}

/// Decodes a `{ "result": ... }` response holding one result or a list of
/// results (one per statement of a transaction).
pub fn decode_response(raw: &str) -> Result<Vec<DecodedResult>, PayloadError> {
    let response: RawResponse = serde_json::from_str(raw)?;
    let results = match response.result {
        RawResults::Many(results) => results,
        RawResults::One(result) => vec![result],
    };
    Ok(results.into_iter().map(decode_result).collect())
}

fn decode_result(raw: RawResult) -> DecodedResult {
    let columns = raw
        .columns
        .into_iter()
        .map(|name| ColumnDefinition::new(name, ColumnType::Any))
        .collect();
    let rows = raw
        .rows
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.into_iter().map(json_to_cell).collect())
        .collect();

    DecodedResult {
        result_set: ResultSet::new(columns, rows),
        stats: raw.meta,
    }
}

fn json_to_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Bool(flag) => CellValue::Integer(i64::from(flag)),
        Value::Number(number) => number
            .as_i64()
            .map(CellValue::Integer)
            .or_else(|| number.as_f64().map(CellValue::Real))
            .unwrap_or_else(|| CellValue::Text(number.to_string())),
        Value::String(text) => CellValue::Text(text),
        Value::Array(items) => match bytes_from_array(&items) {
            Some(bytes) => CellValue::Binary(bytes),
            None => CellValue::Text(Value::Array(items).to_string()),
        },
        Value::Object(_) => CellValue::Text(value.to_string()),
    }
}

fn bytes_from_array(items: &[Value]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
        .collect()
}

/// Serves the first result of a JSON payload file as a result source.
#[derive(Debug, Clone)]
pub struct JsonPayloadSource {
    path: PathBuf,
}

impl JsonPayloadSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<DecodedResult, PayloadError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| PayloadError::Read {
                path: self.path.clone(),
                source,
            })?;
        decode_response(&raw)?
            .into_iter()
            .next()
            .ok_or(PayloadError::Empty)
    }
}

#[derive(Debug)]
pub struct PayloadRowStream {
    columns: Vec<ColumnDefinition>,
    rows: VecDeque<Vec<CellValue>>,
}

#[async_trait]
impl ResultRowStream for PayloadRowStream {
    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError> {
        Ok(self.rows.pop_front())
    }

    async fn cancel(&mut self) -> Result<(), SourceError> {
        self.rows.clear();
        Ok(())
    }
}

#[async_trait]
impl ResultSource for JsonPayloadSource {
    type Stream = PayloadRowStream;

    async fn start(&self, request: &str) -> Result<Self::Stream, SourceError> {
        debug!(path = %self.path.display(), request, "reading results payload");
        let decoded = self
            .read()
            .await
            .map_err(|error| SourceError::new(error.to_string()))?;
        Ok(PayloadRowStream {
            columns: decoded.result_set.columns,
            rows: decoded.result_set.rows.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use dbstudio_core::loader::{CancellationToken, ResultLoader};
    use dbstudio_core::matrix::CellValue;
    use tempfile::TempDir;

    use super::{decode_response, JsonPayloadSource, PayloadError};

    #[test]
    fn decodes_single_result_with_duplicate_columns() {
        let decoded = decode_response(
            r#"{"result":{"columns":["id","name","id"],"rows":[[1,"alice",2.5]],"meta":{"rows_read":7,"rows_written":0}}}"#,
        )
        .expect("payload should decode");

        assert_eq!(decoded.len(), 1);
        let result = &decoded[0];
        assert_eq!(result.stats.rows_read, 7);
        let names = result
            .result_set
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["id", "name", "__id_0"]);
        assert_eq!(
            result.result_set.rows[0],
            vec![
                CellValue::Integer(1),
                CellValue::Text("alice".to_string()),
                CellValue::Real(2.5)
            ]
        );
    }

    #[test]
    fn decodes_transaction_results_and_odd_values() {
        let decoded = decode_response(
            r#"{"result":[
                {"columns":["a"],"rows":[[null],[true],[[1,2,255]],[{"k":1}]],"meta":{"rows_read":4,"rows_written":0}},
                {"columns":[],"rows":null,"meta":{"rows_read":0,"rows_written":3}}
            ]}"#,
        )
        .expect("payload should decode");

        assert_eq!(decoded.len(), 2);
        let rows = &decoded[0].result_set.rows;
        assert_eq!(rows[0][0], CellValue::Null);
        assert_eq!(rows[1][0], CellValue::Integer(1));
        assert_eq!(rows[2][0], CellValue::Binary(vec![1, 2, 255]));
        assert_eq!(rows[3][0], CellValue::Text(r#"{"k":1}"#.to_string()));
        assert!(decoded[1].result_set.rows.is_empty());
        assert_eq!(decoded[1].stats.rows_written, 3);
    }

    #[test]
    fn malformed_payload_is_reported() {
        assert!(matches!(
            decode_response("{\"rows\": []}"),
            Err(PayloadError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn payload_file_feeds_the_result_loader() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("result.json");
        fs::write(
            &path,
            r#"{"result":{"columns":["n"],"rows":[[1],[2],[3]],"meta":{"rows_read":3,"rows_written":0}}}"#,
        )
        .expect("failed to write payload");

        let loader = ResultLoader::with_page_limit(JsonPayloadSource::new(&path), 2);
        let page = loader
            .load("select n from numbers", &CancellationToken::new())
            .await
            .expect("load should succeed");

        assert_eq!(page.summary.rows_loaded, 2);
        assert!(page.summary.truncated);
    }

    #[tokio::test]
    async fn missing_payload_file_is_a_read_error() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let source = JsonPayloadSource::new(temp_dir.path().join("missing.json"));
        assert!(matches!(
            source.read().await,
            Err(PayloadError::Read { .. })
        ));
    }
}
