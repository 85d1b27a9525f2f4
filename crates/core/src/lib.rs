pub mod clipboard;
pub mod context_menu;
pub mod dispatcher;
pub mod edit_session;
pub mod error;
pub mod grid_state;
pub mod input;
pub mod loader;
pub mod matrix;
pub mod selection;
pub mod settings;
pub mod viewport;

pub use clipboard::{Clipboard, ClipboardError, MemoryClipboard, PasteOutcome, PasteTicket};
pub use dispatcher::{CommandDispatcher, Dispatch, GridAction};
pub use error::GridError;
pub use grid_state::{GridEvent, GridState, SubscriptionId};
pub use input::{GridInput, Key, KeyBindings, KeyInput, Modifiers};
pub use matrix::{CellAddress, CellValue, ColumnDefinition, ColumnType, ResultSet};
pub use selection::{derive_anchor, CellRange};
pub use viewport::{HorizontalEdge, ScrollOffset, VerticalEdge, ViewportConfig};
