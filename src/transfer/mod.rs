//! Portable snapshot of step history and settings.

pub mod document;
mod error;
mod export;
mod import;

pub use document::{ExportDocument, SCHEMA_ID, SCHEMA_VERSION};
pub use error::TransferError;
pub use export::{export_document, export_json};
pub use import::{import_json, preview_import, ImportMode, ImportPreview, ImportSummary};
