//! Package manifest: file format, built-in defaults and the refreshable store.

pub mod defaults;
pub mod schema;
pub mod store;

pub use defaults::{builtin_manifest, MESSENGER_INSTALLER, RUNTIME_INSTALLER};
pub use schema::{
    resolve_url, Manifest, ManifestFile, PackageEntry, PackageRecord, PostDownloadAction,
};
pub use store::{ManifestOrigin, ManifestStore, MANIFEST_TIMEOUT};
