pub mod clipboard;
pub mod payload;

pub use clipboard::SystemClipboard;
pub use payload::{decode_response, DecodedResult, JsonPayloadSource, PayloadError, ResultStats};
