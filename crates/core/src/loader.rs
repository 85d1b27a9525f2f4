use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::matrix::{CellValue, ColumnDefinition, ResultSet};

pub const DEFAULT_PAGE_LIMIT: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("result source failed: {0}")]
    Source(#[source] SourceError),
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_loaded: usize,
    /// More rows were available beyond the page limit.
    pub truncated: bool,
    pub was_cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    pub result: ResultSet,
    pub summary: LoadSummary,
}

/// Rows of one result, after its columns are known.
#[async_trait]
pub trait ResultRowStream: Send {
    fn columns(&self) -> &[ColumnDefinition];

    async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError>;

    async fn cancel(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// A driver that can produce results for a request (usually a statement).
#[async_trait]
pub trait ResultSource {
    type Stream: ResultRowStream + Send;

    async fn start(&self, request: &str) -> Result<Self::Stream, SourceError>;
}

#[derive(Debug)]
pub struct ResultLoader<S: ResultSource> {
    source: S,
    page_limit: usize,
}

impl<S: ResultSource> ResultLoader<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::with_page_limit(source, DEFAULT_PAGE_LIMIT)
    }

    #[must_use]
    pub fn with_page_limit(source: S, page_limit: usize) -> Self {
        Self { source, page_limit }
    }

    #[must_use]
    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// Collects one page of rows. The stream is cancelled when the page fills
    /// up or `cancellation` fires; the rows read so far are kept.
    pub async fn load(
        &self,
        request: &str,
        cancellation: &CancellationToken,
    ) -> Result<LoadedPage, LoadError> {
        let started_at = Instant::now();
        let mut stream = self.source.start(request).await.map_err(LoadError::Source)?;
        let columns = stream.columns().to_vec();

        let mut rows = Vec::new();
        let mut truncated = false;
        let mut was_cancelled = false;

        loop {
            if cancellation.is_cancelled() {
                was_cancelled = true;
                stream.cancel().await.map_err(LoadError::Source)?;
                break;
            }

            let Some(row) = stream.next_row().await.map_err(LoadError::Source)? else {
                break;
            };
            if rows.len() == self.page_limit {
                truncated = true;
                stream.cancel().await.map_err(LoadError::Source)?;
                break;
            }
            rows.push(row);
        }

        let summary = LoadSummary {
            rows_loaded: rows.len(),
            truncated,
            was_cancelled,
            elapsed: started_at.elapsed(),
        };
        debug!(
            rows = summary.rows_loaded,
            truncated, was_cancelled, "result page loaded"
        );

        Ok(LoadedPage {
            result: ResultSet::new(columns, rows),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use super::{
        CancellationToken, LoadError, ResultLoader, ResultRowStream, ResultSource, SourceError,
    };
    use crate::matrix::{CellValue, ColumnDefinition, ColumnType};

    #[derive(Debug, Clone)]
    struct FakeSource {
        columns: Vec<ColumnDefinition>,
        rows: Vec<Vec<CellValue>>,
        fail_on_start: bool,
        cancel_called: Arc<AtomicBool>,
    }

    impl FakeSource {
        fn with_rows(count: i64) -> Self {
            Self {
                columns: vec![
                    ColumnDefinition::new("id", ColumnType::Integer),
                    ColumnDefinition::new("id", ColumnType::Integer),
                ],
                rows: (0..count)
                    .map(|id| vec![CellValue::Integer(id), CellValue::Integer(id * 10)])
                    .collect(),
                fail_on_start: false,
                cancel_called: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[derive(Debug)]
    struct FakeStream {
        columns: Vec<ColumnDefinition>,
        rows: VecDeque<Vec<CellValue>>,
        cancel_called: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ResultRowStream for FakeStream {
        fn columns(&self) -> &[ColumnDefinition] {
            &self.columns
        }

        async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>, SourceError> {
            Ok(self.rows.pop_front())
        }

        async fn cancel(&mut self) -> Result<(), SourceError> {
            self.cancel_called.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl ResultSource for FakeSource {
        type Stream = FakeStream;

        async fn start(&self, _request: &str) -> Result<Self::Stream, SourceError> {
            if self.fail_on_start {
                return Err(SourceError::new("no such table: users"));
            }
            Ok(FakeStream {
                columns: self.columns.clone(),
                rows: self.rows.iter().cloned().collect(),
                cancel_called: Arc::clone(&self.cancel_called),
            })
        }
    }

    #[tokio::test]
    async fn loads_every_row_below_page_limit() {
        let source = FakeSource::with_rows(3);
        let cancel_called = Arc::clone(&source.cancel_called);
        let loader = ResultLoader::with_page_limit(source, 10);

        let page = loader
            .load("select * from users", &CancellationToken::new())
            .await
            .expect("load should succeed");

        assert_eq!(page.summary.rows_loaded, 3);
        assert!(!page.summary.truncated);
        assert!(!page.summary.was_cancelled);
        assert_eq!(page.result.rows.len(), 3);
        assert_eq!(page.result.columns[1].name, "__id_0");
        assert!(!cancel_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn page_limit_truncates_and_cancels_stream() {
        let source = FakeSource::with_rows(5);
        let cancel_called = Arc::clone(&source.cancel_called);
        let loader = ResultLoader::with_page_limit(source, 2);

        let page = loader
            .load("select * from users", &CancellationToken::new())
            .await
            .expect("load should succeed");

        assert_eq!(page.summary.rows_loaded, 2);
        assert!(page.summary.truncated);
        assert!(cancel_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn exact_page_is_not_truncated() {
        let loader = ResultLoader::with_page_limit(FakeSource::with_rows(2), 2);
        let page = loader
            .load("select * from users", &CancellationToken::new())
            .await
            .expect("load should succeed");
        assert!(!page.summary.truncated);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_stream() {
        let source = FakeSource::with_rows(5);
        let cancel_called = Arc::clone(&source.cancel_called);
        let loader = ResultLoader::new(source);
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let page = loader
            .load("select * from users", &cancellation)
            .await
            .expect("load should cancel cleanly");

        assert_eq!(page.summary.rows_loaded, 0);
        assert!(page.summary.was_cancelled);
        assert!(cancel_called.load(Ordering::SeqCst));
        assert_eq!(page.result.columns.len(), 2);
    }

    #[tokio::test]
    async fn source_failure_is_reported() {
        let mut source = FakeSource::with_rows(1);
        source.fail_on_start = true;
        let loader = ResultLoader::new(source);

        let error = loader
            .load("select * from users", &CancellationToken::new())
            .await
            .expect_err("load should fail");
        assert!(matches!(error, LoadError::Source(_)));
        assert!(error.to_string().contains("no such table"));
    }
}
