//! Build configuration consumed by the splitters and generators.

use crate::android::manifest_merger::MergeMode;
use crate::error::BundleResult;
use crate::targeting::{versions, Abi};
use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

bitflags! {
    /// Dimensions config splits are generated for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct OptimizationDimensions: u32 {
        const ABI = 0x1;
        const SCREEN_DENSITY = 0x2;
        const LANGUAGE = 0x4;
        const TEXTURE_COMPRESSION_FORMAT = 0x8;
        const DEVICE_TIER = 0x10;
    }
}

impl Default for OptimizationDimensions {
    fn default() -> Self {
        OptimizationDimensions::ABI
            | OptimizationDimensions::SCREEN_DENSITY
            | OptimizationDimensions::LANGUAGE
    }
}

/// API levels at which each optimization becomes available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkThresholds {
    /// Uncompressed native libraries variant.
    pub native_libraries: u32,
    /// Uncompressed dex variant.
    pub dex: u32,
    /// Uncompressed dex variant when the override is requested.
    pub dex_override: u32,
    pub sparse_encoding: u32,
    pub sdk_runtime: u32,
    /// Lowest SDK able to load uncompressed native libraries.
    pub native_compression_gate: u32,
    /// Lowest SDK able to load uncompressed dex files.
    pub dex_compression_gate: u32,
}

pub static DEFAULT_SDK_THRESHOLDS: Lazy<SdkThresholds> = Lazy::new(|| SdkThresholds {
    native_libraries: versions::MARSHMALLOW,
    dex: versions::Q,
    dex_override: versions::S,
    sparse_encoding: versions::S_V2,
    sdk_runtime: versions::T,
    native_compression_gate: versions::MARSHMALLOW,
    dex_compression_gate: versions::P,
});

impl Default for SdkThresholds {
    fn default() -> Self {
        DEFAULT_SDK_THRESHOLDS.clone()
    }
}

/// Removal of `#<key>_<value>` directory tags from output paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuffixStripping {
    pub enabled: bool,
    /// Value whose directories also populate the fallback split, e.g. `astc` or `0`.
    pub default_suffix: Option<String>,
}

impl SuffixStripping {
    pub fn enabled_with_default(default_suffix: impl Into<String>) -> Self {
        SuffixStripping {
            enabled: true,
            default_suffix: Some(default_suffix.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApkGenerationConfiguration {
    pub optimization_dimensions: OptimizationDimensions,
    pub uncompress_native_libraries: bool,
    pub uncompress_dex_files: bool,
    /// Moves the uncompressed dex variant from Q to S.
    pub dex_compression_variant_override: bool,
    pub enable_sparse_encoding_variant: bool,
    pub enable_sdk_runtime_variant: bool,
    pub for_instant_app_variants: bool,
    pub include_64_bit_libs: bool,
    pub min_sdk_for_additional_variant_with_v3_rotation: Option<u32>,
    pub texture_suffix_stripping: SuffixStripping,
    pub device_tier_suffix_stripping: SuffixStripping,
    pub manifest_merge_mode: MergeMode,
    /// Emits languages of system shards as separate config splits.
    pub split_languages_out_of_system_shard: bool,
    /// ABIs to build placeholder shards for when the bundle has no native code.
    pub placeholder_abis: BTreeSet<Abi>,
    pub sdk_thresholds: SdkThresholds,
}

impl Default for ApkGenerationConfiguration {
    fn default() -> Self {
        ApkGenerationConfiguration {
            optimization_dimensions: OptimizationDimensions::default(),
            uncompress_native_libraries: true,
            uncompress_dex_files: true,
            dex_compression_variant_override: false,
            enable_sparse_encoding_variant: false,
            enable_sdk_runtime_variant: false,
            for_instant_app_variants: false,
            include_64_bit_libs: true,
            min_sdk_for_additional_variant_with_v3_rotation: None,
            texture_suffix_stripping: SuffixStripping::default(),
            device_tier_suffix_stripping: SuffixStripping::default(),
            manifest_merge_mode: MergeMode::default(),
            split_languages_out_of_system_shard: false,
            placeholder_abis: BTreeSet::new(),
            sdk_thresholds: SdkThresholds::default(),
        }
    }
}

impl ApkGenerationConfiguration {
    /// Reads a configuration from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> BundleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_enabled(&self, dimension: OptimizationDimensions) -> bool {
        self.optimization_dimensions.contains(dimension)
    }

    /// SDK at which the uncompressed dex variant starts.
    pub fn dex_variant_threshold(&self) -> u32 {
        if self.dex_compression_variant_override {
            self.sdk_thresholds.dex_override
        } else {
            self.sdk_thresholds.dex
        }
    }

    pub fn with_dimensions(mut self, dimensions: OptimizationDimensions) -> Self {
        self.optimization_dimensions = dimensions;
        self
    }

    pub fn for_instant_apps(mut self) -> Self {
        self.for_instant_app_variants = true;
        self
    }
}
