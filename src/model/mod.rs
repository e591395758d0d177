pub mod config;
pub mod entry;
pub mod metadata;
pub mod module;
pub mod split;

pub use config::{ApkGenerationConfiguration, OptimizationDimensions, SdkThresholds, SuffixStripping};
pub use entry::ModuleEntry;
pub use metadata::{BundleMetadata, RuntimeEnabledSdk, RuntimeEnabledSdkConfig};
pub use module::{BundleModule, ModuleType};
pub use split::{ModuleSplit, SplitType};
