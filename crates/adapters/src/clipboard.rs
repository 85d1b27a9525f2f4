use async_trait::async_trait;
use copypasta::{ClipboardContext, ClipboardProvider};
use dbstudio_core::clipboard::{Clipboard, ClipboardError};
use tracing::warn;

/// The desktop clipboard. A fresh provider is opened per access, so the
/// handle itself stays `Send + Sync` on every platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether a clipboard provider can be opened at all, e.g. false on a
    /// headless session without a display server.
    #[must_use]
    pub fn is_available() -> bool {
        ClipboardContext::new().is_ok()
    }
}

fn unavailable(error: &(dyn std::error::Error + Send + Sync)) -> ClipboardError {
    ClipboardError::Unavailable(error.to_string())
}

fn read_blocking() -> Result<String, ClipboardError> {
    let mut context = ClipboardContext::new().map_err(|error| unavailable(error.as_ref()))?;
    context
        .get_contents()
        .map_err(|error| unavailable(error.as_ref()))
}

#[async_trait]
impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut context = ClipboardContext::new().map_err(|error| unavailable(error.as_ref()))?;
        context
            .set_contents(text.to_owned())
            .map_err(|error| unavailable(error.as_ref()))
    }

    async fn read_text(&self) -> Result<String, ClipboardError> {
        match tokio::task::spawn_blocking(read_blocking).await {
            Ok(result) => result,
            Err(error) => {
                warn!(%error, "clipboard read task failed");
                Err(ClipboardError::Unavailable(error.to_string()))
            }
        }
    }
}
