pub mod clipboard;
pub mod http;

pub use clipboard::{ClipboardError, SystemClipboard};
pub use http::{HttpBackend, HttpBackendError};
