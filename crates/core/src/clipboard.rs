use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::matrix::{CellAddress, CellValue, ColumnType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard is unavailable: {0}")]
    Unavailable(String),
}

/// Host clipboard. Writes are synchronous; reads may wait on the host.
#[async_trait]
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    async fn read_text(&self) -> Result<String, ClipboardError>;
}

/// In-process clipboard, also used when no system clipboard can be reached.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
    unavailable: bool,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Some(text.into()))),
            unavailable: false,
        }
    }

    /// A clipboard that denies every access.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            contents: Arc::default(),
            unavailable: true,
        }
    }

    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|guard| guard.clone())
    }

    fn check_access(&self) -> Result<(), ClipboardError> {
        if self.unavailable {
            return Err(ClipboardError::Unavailable(
                "clipboard access denied".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.check_access()?;
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".to_string()))?;
        *guard = Some(text.to_string());
        Ok(())
    }

    async fn read_text(&self) -> Result<String, ClipboardError> {
        self.check_access()?;
        let guard = self
            .contents
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard lock poisoned".to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }
}

/// Captured at the start of a paste. The paste only lands if no focus,
/// selection, edit or paste activity happened before the read resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteTicket {
    pub(crate) generation: u64,
    pub(crate) target: CellAddress,
}

impl PasteTicket {
    #[must_use]
    pub fn target(&self) -> CellAddress {
        self.target
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PasteOutcome {
    Applied {
        cell: CellAddress,
        value: CellValue,
        changed: bool,
    },
    Stale {
        cell: CellAddress,
    },
    TypeMismatch {
        cell: CellAddress,
        expected: ColumnType,
        text: String,
    },
    ClipboardUnavailable,
}

#[cfg(test)]
mod tests {
    use super::{Clipboard, ClipboardError, MemoryClipboard};

    #[tokio::test]
    async fn memory_clipboard_round_trips_text() {
        let clipboard = MemoryClipboard::new();
        clipboard.write_text("hello").expect("write should succeed");
        assert_eq!(clipboard.read_text().await, Ok("hello".to_string()));
        assert_eq!(clipboard.contents().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn unavailable_clipboard_reports_errors() {
        let clipboard = MemoryClipboard::unavailable();
        assert!(matches!(
            clipboard.write_text("x"),
            Err(ClipboardError::Unavailable(_))
        ));
        assert!(clipboard.read_text().await.is_err());
    }

    #[tokio::test]
    async fn clones_share_contents() {
        let clipboard = MemoryClipboard::with_text("a");
        let shared = clipboard.clone();
        shared.write_text("b").expect("write should succeed");
        assert_eq!(clipboard.read_text().await, Ok("b".to_string()));
    }
}
