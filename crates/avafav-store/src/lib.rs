// Single-file document collections on top of SQLite
// Point lookups, equality scans, upserts - the boring storage bits

pub mod collection;
pub mod document;
pub mod error;
pub mod store;

pub use collection::{Collection, Upserted};
pub use document::{DocId, Document, FieldValue, Filter};
pub use error::{Result, StoreError};
pub use store::StoreFile;
