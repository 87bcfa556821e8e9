//! Domain model for the forgehub module registry.
//!
//! - Modules and releases, with merge semantics keyed on full name
//! - Version ordering used to pick the current release
//! - Metadata documents and the v3 JSON wire format
//! - Pagination envelopes and search-result deduplication

pub mod document;
pub mod error;
pub mod metadata;
pub mod module;
pub mod page;
pub mod release;
pub mod search_result;
pub mod version;

pub use document::{
    LegacyReleaseDocument, ModuleDocument, ModuleShortDocument, OwnerDocument, ReleaseDocument,
    ReleaseShortDocument,
};
pub use error::ModelError;
pub use metadata::{
    Dependency, ReleaseMetadata, SourceMetadata, normalize_full_name, split_full_name,
};
pub use module::Module;
pub use page::{Page, Pagination};
pub use release::Release;
pub use search_result::{merge_modules, merge_releases};
pub use version::{compare_versions, max_version, sort_by_version_desc};
