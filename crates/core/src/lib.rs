//! # Locode Core
//!
//! Core logic for hierarchical location codes such as `T01:C02:B07`.
//!
//! This crate contains pure data operations:
//! - Delimiter validation and the format mini-language (`\d`, `\a`, `\p` and literals)
//! - Per-family format registries that resolve a segment to its format
//! - The [`CodeStore`] hierarchy manager: families, formats, segment trees, cloning and deletion
//! - YAML persistence of the store
//!
//! **No CLI concerns**: argument parsing, environment access and output formatting belong in
//! `locode-cli`.

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod ids;
pub mod model;
pub mod registry;
pub mod snapshot;
pub mod store;
pub mod validation;

pub use config::CoreConfig;
pub use error::{CodeError, CodeResult};
pub use format::{validate_segment, CompiledFormat, Token};
pub use ids::{FamilyId, FormatId, SegmentId};
pub use locode_types::NonEmptyText;
pub use model::{
    Actor, AuditStamp, ClonedRecord, DeletedFamily, DeletedFormat, FamilyDraft, FamilyUpdate,
    FormatDefinition, FormatDraft, FormatFamily, FormatUpdate, SegmentDraft, SegmentInstance,
    SegmentUpdate,
};
pub use registry::{FormatRegistry, RegisteredFormat};
pub use snapshot::StoreFile;
pub use store::{CodeStore, SegmentFilter};
pub use validation::Delimiter;
