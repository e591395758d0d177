//! SDK-version variants a module, or a whole bundle, is built for.

use crate::error::BundleResult;
use crate::model::config::ApkGenerationConfiguration;
use crate::model::module::BundleModule;
use crate::targeting::{versions, VariantTargeting};
use log::{debug, info};
use rangemap::RangeInclusiveMap;
use std::collections::{BTreeMap, BTreeSet};

/// Computes the variants of a single module.
pub struct VariantGenerator<'a> {
    config: &'a ApkGenerationConfiguration,
}

impl<'a> VariantGenerator<'a> {
    pub fn new(config: &'a ApkGenerationConfiguration) -> Self {
        VariantGenerator { config }
    }

    /// Thresholds of the optimizations that apply to `module`, in application order.
    fn thresholds(&self, module: &BundleModule) -> Vec<u32> {
        let config = self.config;
        let thresholds = &config.sdk_thresholds;
        let candidates = [
            (
                config.uncompress_native_libraries && module.has_native_libraries(),
                thresholds.native_libraries,
            ),
            (config.uncompress_dex_files && module.has_dex(), config.dex_variant_threshold()),
            (
                config.enable_sparse_encoding_variant && module.resource_table.is_some(),
                thresholds.sparse_encoding,
            ),
            (
                config.min_sdk_for_additional_variant_with_v3_rotation.is_some(),
                config
                    .min_sdk_for_additional_variant_with_v3_rotation
                    .unwrap_or(versions::LOLLIPOP),
            ),
            (self.requires_sdk_runtime(module), thresholds.sdk_runtime),
        ];
        candidates
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, threshold)| threshold)
            .collect()
    }

    fn requires_sdk_runtime(&self, module: &BundleModule) -> bool {
        self.config.enable_sdk_runtime_variant && !module.runtime_enabled_sdks.is_empty()
    }

    pub fn generate_variants(&self, module: &BundleModule) -> BundleResult<BTreeSet<VariantTargeting>> {
        let max_sdk = module.max_sdk();
        if let Some(max_sdk) = max_sdk {
            if max_sdk < versions::LOLLIPOP {
                fail!(
                    "maxSdkVersion ({}) is less than minimum sdk allowed for variants ({}).",
                    max_sdk,
                    versions::LOLLIPOP
                );
            }
        }
        if self.config.for_instant_app_variants {
            return Ok(BTreeSet::from([VariantTargeting::l_plus()]));
        }

        let min_sdk = module.min_sdk();
        let mut mins = BTreeSet::from([versions::LOLLIPOP]);
        for threshold in self.thresholds(module) {
            if min_sdk < threshold && max_sdk.map_or(true, |max_sdk| threshold <= max_sdk) {
                mins.insert(threshold);
            }
        }

        let runtime_threshold = self
            .requires_sdk_runtime(module)
            .then_some(self.config.sdk_thresholds.sdk_runtime);
        let variants = with_sibling_alternatives(
            mins.iter()
                .map(|min| (*min, runtime_threshold.is_some_and(|threshold| *min >= threshold))),
        );
        debug!(
            "Module '{}' (min SDK {}) needs variants {:?}.",
            module.name, min_sdk, mins
        );
        Ok(variants)
    }
}

fn with_sibling_alternatives(
    variants: impl IntoIterator<Item = (u32, bool)>,
) -> BTreeSet<VariantTargeting> {
    let variants: BTreeMap<u32, bool> = variants.into_iter().collect();
    variants
        .iter()
        .map(|(min, requires_runtime)| {
            VariantTargeting::sdk_with_alternatives(*min, variants.keys().copied())
                .with_sdk_runtime(*requires_runtime)
        })
        .collect()
}

/// Combines the variants of every module of a bundle.
pub struct VariantTargetingGenerator<'a> {
    config: &'a ApkGenerationConfiguration,
}

impl<'a> VariantTargetingGenerator<'a> {
    pub fn new(config: &'a ApkGenerationConfiguration) -> Self {
        VariantTargetingGenerator { config }
    }

    /// Union of the module variants with alternatives recomputed over the union.
    pub fn generate(&self, modules: &[BundleModule]) -> BundleResult<BTreeSet<VariantTargeting>> {
        let generator = VariantGenerator::new(self.config);
        let mut mins: BTreeMap<u32, bool> = BTreeMap::new();
        for module in modules {
            for variant in generator.generate_variants(module)? {
                if let Some(min) = variant.min_sdk() {
                    *mins.entry(min).or_default() |= variant.requires_sdk_runtime;
                }
            }
        }
        if mins.is_empty() {
            mins.insert(versions::LOLLIPOP, false);
        }
        let variants = with_sibling_alternatives(mins);
        info!("Generating split APKs for {} variants.", variants.len());
        Ok(variants)
    }
}

/// Resolves the variant serving a device of a given SDK level.
#[derive(Debug, Clone)]
pub struct VariantRanges {
    ranges: RangeInclusiveMap<u32, VariantTargeting>,
}

impl VariantRanges {
    pub fn new(variants: &BTreeSet<VariantTargeting>) -> Self {
        let pinned: Vec<(u32, &VariantTargeting)> = variants
            .iter()
            .filter_map(|variant| Some((variant.min_sdk()?, variant)))
            .collect();
        let mut ranges = RangeInclusiveMap::new();
        for (idx, (min, variant)) in pinned.iter().enumerate() {
            let end = pinned
                .get(idx + 1)
                .map_or(u32::MAX, |(next_min, _)| next_min.saturating_sub(1));
            if *min <= end {
                ranges.insert(*min..=end, (*variant).clone());
            }
        }
        VariantRanges { ranges }
    }

    pub fn variant_for_sdk(&self, sdk: u32) -> Option<&VariantTargeting> {
        self.ranges.get(&sdk)
    }
}
