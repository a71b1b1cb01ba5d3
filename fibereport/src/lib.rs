//! fibereport lets an operator pick a subset of a parsed fiber trace (OTDR)
//! dataset, optionally along with a chart snapshot, and turn it into either a
//! JSON payload for a remote endpoint or a printable HTML report.
//!
//! This crate provides the engine. For the command line interface, see the
//! `fibereport-cli` crate.

pub mod config;
mod dataset;
mod error;
pub mod files;
mod fs;
pub mod payload;
mod property;
mod report;
mod selection;
pub mod session;
mod store;
mod table;
pub mod template;
mod transport;
pub mod value;

pub use config::{Config, ServerConfig};
pub use dataset::{Dataset, Row, Table, TableId};
pub use error::Error;
pub use files::{FileBrowser, FileEntry, Listing, UploadOutcome, UploadedFile};
pub use payload::{project_payload, ChartSnapshot, FileSnapshot, NoSnapshot, Payload};
pub use property::{normalize_leaf, Leaves, PropertyProjector};
pub use report::ReportGenerator;
pub use selection::{PropertyPath, SelectionState};
pub use session::{parse_actions, Action, Session};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use table::{ProjectedRow, TableSelector};
pub use template::{Template, TemplateStore};
pub use transport::{FilePreview, HttpTransport, PreviewSurface, Transport};
pub use value::{Map, PropertyNode, Scalar, SupportedFormat};
