pub mod config;
pub mod document;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use document::{Document, DocumentOp, DocumentPatch, PatchError};
pub use error::{CadenceError, Result};
pub use types::*;
