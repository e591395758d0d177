//! Compression decisions for native libraries and dex files.
//!
//! Platforms from the gate version on can load both directly from the APK, so those
//! entries are stored uncompressed there. Below the gate the entries stay compressed.

use crate::android::mutator::ManifestMutator;
use crate::error::BundleResult;
use crate::model::config::ApkGenerationConfiguration;
use crate::model::entry::ModuleEntry;
use crate::model::module::DEX_DIRECTORY;
use crate::model::split::{ModuleSplit, SplitType};
use crate::splitters::ModuleSplitSplitter;
use crate::targeting::generator::LIB_DIRECTORY;
use crate::targeting::{versions, ApkTargeting, Targeting};
use log::debug;
use std::collections::BTreeSet;

struct CompressionPolicy {
    directory: &'static str,
    gate: u32,
    enabled: bool,
    /// Native libraries also steer `extractNativeLibs`.
    extract_native_libs: bool,
}

impl CompressionPolicy {
    fn exempt_files(&self, split: &ModuleSplit) -> BTreeSet<String> {
        if !self.extract_native_libs {
            return BTreeSet::new();
        }
        split
            .manifest
            .native_activity_libraries()
            .into_iter()
            .map(|name| format!("lib{name}.so"))
            .collect()
    }

    fn uncompressed_entries(&self, split: &ModuleSplit) -> Vec<ModuleEntry> {
        let exempt = self.exempt_files(split);
        split
            .entries
            .iter()
            .map(|entry| {
                if entry.is_under(self.directory) && !exempt.contains(entry.file_name()) {
                    entry.clone().with_force_uncompressed(true)
                } else {
                    entry.clone()
                }
            })
            .collect()
    }

    fn with_extract_mutator(&self, split: ModuleSplit, extract: bool) -> ModuleSplit {
        if self.extract_native_libs {
            split.with_manifest_mutator(ManifestMutator::ExtractNativeLibs(extract))
        } else {
            split
        }
    }

    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        if !self.enabled
            || split.split_type == SplitType::Instant
            || split.entries_under(self.directory).next().is_none()
        {
            return Ok(vec![split.clone()]);
        }

        if let Some(min_sdk) = split.variant_targeting.min_sdk() {
            if min_sdk < self.gate {
                return Ok(vec![split.clone()]);
            }
            let uncompressed = split.clone().with_entries(self.uncompressed_entries(split));
            return Ok(vec![self.with_extract_mutator(uncompressed, false)]);
        }

        debug!(
            "Forking '{}' at SDK {} for '{}' compression.",
            split.module_name, self.gate, self.directory
        );
        let below = split.apk_targeting.merge(&ApkTargeting::default().with_sdk_version(
            Targeting::with_alternatives(versions::LOLLIPOP, [self.gate]),
        ))?;
        let above = split.apk_targeting.merge(&ApkTargeting::default().with_sdk_version(
            Targeting::with_alternatives(self.gate, [versions::LOLLIPOP]),
        ))?;
        Ok(vec![
            self.with_extract_mutator(split.clone().with_apk_targeting(below), true),
            self.with_extract_mutator(
                split
                    .clone()
                    .with_entries(self.uncompressed_entries(split))
                    .with_apk_targeting(above),
                false,
            ),
        ])
    }
}

/// Stores native libraries uncompressed from Android M on.
pub struct NativeLibrariesCompressionSplitter {
    policy: CompressionPolicy,
}

impl NativeLibrariesCompressionSplitter {
    pub fn new(config: &ApkGenerationConfiguration) -> Self {
        NativeLibrariesCompressionSplitter {
            policy: CompressionPolicy {
                directory: LIB_DIRECTORY,
                gate: config.sdk_thresholds.native_compression_gate,
                enabled: config.uncompress_native_libraries,
                extract_native_libs: true,
            },
        }
    }
}

impl ModuleSplitSplitter for NativeLibrariesCompressionSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        self.policy.split(split)
    }
}

/// Stores dex files uncompressed from Android P on.
pub struct DexCompressionSplitter {
    policy: CompressionPolicy,
}

impl DexCompressionSplitter {
    pub fn new(config: &ApkGenerationConfiguration) -> Self {
        DexCompressionSplitter {
            policy: CompressionPolicy {
                directory: DEX_DIRECTORY,
                gate: config.sdk_thresholds.dex_compression_gate,
                enabled: config.uncompress_dex_files,
                extract_native_libs: false,
            },
        }
    }
}

impl ModuleSplitSplitter for DexCompressionSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        self.policy.split(split)
    }
}
