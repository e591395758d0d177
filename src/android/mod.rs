//! Android manifest model, deferred manifest edits and the fusing manifest merger.

pub mod manifest;
pub mod manifest_merger;
pub mod mutator;

pub use manifest::{AndroidManifest, ManifestAttribute, ManifestElement, ManifestValue};
pub use manifest_merger::{merge_manifests, MergeMode, BASE_MODULE_NAME};
pub use mutator::ManifestMutator;
