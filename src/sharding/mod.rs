//! Top-level generators turning bundle modules into finished splits.

pub mod shard_merger;
pub mod sharded_apks;
pub mod split_apks;

use crate::error::BundleResult;
use crate::injectors::{
    inject_all, AbiPlaceholderInjector, BinaryArtProfilesInjector, CodeTransparencyInjector,
    RuntimeEnabledSdkTableInjector,
};
use crate::model::metadata::{BundleMetadata, RuntimeEnabledSdkConfig};
use crate::model::module::BundleModule;
use crate::model::split::ModuleSplit;

pub use shard_merger::ModuleSplitsToShardMerger;
pub use sharded_apks::{ShardedApksGenerator, ShardingMode};
pub use split_apks::SplitApksGenerator;

/// Modules with their directory targeting derived where the reader left it out.
pub(crate) fn prepare_modules(modules: &[BundleModule]) -> BundleResult<Vec<BundleModule>> {
    modules
        .iter()
        .cloned()
        .map(BundleModule::with_generated_targeting)
        .collect()
}

/// Runs the injectors over a split and applies its queued manifest edits.
pub(crate) struct SplitFinisher<'a> {
    metadata: &'a BundleMetadata,
    runtime_enabled_sdks: RuntimeEnabledSdkConfig,
}

impl<'a> SplitFinisher<'a> {
    pub(crate) fn new(modules: &[BundleModule], metadata: &'a BundleMetadata) -> Self {
        let sdks = modules
            .iter()
            .flat_map(|module| module.runtime_enabled_sdks.sdks.iter().cloned())
            .collect();
        SplitFinisher {
            metadata,
            runtime_enabled_sdks: RuntimeEnabledSdkConfig { sdks },
        }
    }

    pub(crate) fn finish(&self, split: ModuleSplit) -> BundleResult<ModuleSplit> {
        let split = inject_all(
            &[
                &AbiPlaceholderInjector,
                &RuntimeEnabledSdkTableInjector::new(&self.runtime_enabled_sdks),
                &BinaryArtProfilesInjector::new(self.metadata),
                &CodeTransparencyInjector::new(self.metadata),
            ],
            split,
        )?;
        Ok(split.finalize())
    }
}
