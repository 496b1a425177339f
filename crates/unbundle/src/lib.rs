//! Content-based archive and compression detection with one reader interface.
//!
//! A [`Source`] is probed by an ordered [`Registry`] of format handlers:
//! archives first (tar, zip, 7z), then single-file compression (bzip2, gzip,
//! and xz/zstd behind features). The winning handler opens a [`Session`]
//! that lists members and streams their content, whatever the format.
//!
//! # Architecture
//!
//! - `detect.rs` - Handler trait and the ordered registry
//! - `backend/` - Per-format handlers and sessions
//! - `archive.rs` - `Archive` and `CompressedFile` facades
//! - `bundle.rs` - Archive-or-compressed iteration
//! - `sanitize.rs` - Member path validation (zip-slip prevention)
//! - `extract.rs` - Writing members to disk

pub use archive::{Archive, CompressedFile};
pub use bundle::{Bundle, files_in_bundle, open_bundle};
pub use detect::{FormatHandler, Registry};
pub use entry::{ExtractReport, ExtractedEntry};
pub use error::{BoxError, Error, Result};
pub use extract::{extract, extract_any, extract_session};
pub use format::{Category, Codec, Format};
pub use options::{ExtractMode, ExtractOptions};
pub use sanitize::check_members;
pub use session::{Member, MemberKind, Session};
pub use source::Source;

mod archive;
pub mod backend;
mod bundle;
pub mod detect;
mod entry;
mod error;
mod extract;
pub mod format;
mod options;
pub mod sanitize;
mod session;
mod source;
