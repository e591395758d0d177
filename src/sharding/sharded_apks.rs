//! Fused APKs: standalone APKs for pre-Lollipop devices and system image APKs.
//!
//! Every module included in fusing is cut by ABI and screen density only. A shard takes
//! the shared parts of all modules plus the parts of one ABI and one density, and is then
//! merged into a single master split.

use crate::error::BundleResult;
use crate::model::config::{ApkGenerationConfiguration, OptimizationDimensions};
use crate::model::metadata::BundleMetadata;
use crate::model::module::BundleModule;
use crate::model::split::{ModuleSplit, SplitType};
use crate::sharding::shard_merger::ModuleSplitsToShardMerger;
use crate::sharding::{prepare_modules, SplitFinisher};
use crate::splitters::{
    AbiNativeLibrariesSplitter, AssetsDimensionSplitter, LanguageResourcesSplitter,
    ModuleSplitSplitter, ModuleSplitter, SanitizerNativeLibrariesSplitter, ScreenDensityResourcesSplitter,
    SplittingPipeline,
};
use crate::targeting::{versions, Abi, ApkTargeting, ScreenDensity, Targeting, VariantTargeting};
use log::{debug, info};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingMode {
    Standalone,
    System,
}

impl ShardingMode {
    fn split_type(self) -> SplitType {
        match self {
            ShardingMode::Standalone => SplitType::Standalone,
            ShardingMode::System => SplitType::System,
        }
    }
}

/// Module parts sorted by the shard dimension they belong to.
#[derive(Default)]
struct ShardParts {
    common: Vec<ModuleSplit>,
    by_abi: BTreeMap<Abi, Vec<ModuleSplit>>,
    by_density: BTreeMap<ScreenDensity, Vec<ModuleSplit>>,
}

impl ShardParts {
    fn add(&mut self, split: ModuleSplit) {
        let abi = split.apk_targeting.abi.as_ref().and_then(|t| t.single_value().copied());
        let density = split
            .apk_targeting
            .screen_density
            .as_ref()
            .and_then(|t| t.single_value().copied());
        match (abi, density) {
            (Some(abi), _) => self.by_abi.entry(abi).or_default().push(split),
            (None, Some(density)) => self.by_density.entry(density).or_default().push(split),
            (None, None) => self.common.push(split),
        }
    }
}

/// Value of a shard dimension with the other shards' values as alternatives.
fn shard_targeting<T: Ord + Clone>(value: &T, all: &[T]) -> Targeting<T> {
    Targeting::with_alternatives(value.clone(), all.iter().cloned())
}

pub struct ShardedApksGenerator<'a> {
    config: &'a ApkGenerationConfiguration,
    metadata: &'a BundleMetadata,
}

impl<'a> ShardedApksGenerator<'a> {
    pub fn new(config: &'a ApkGenerationConfiguration, metadata: &'a BundleMetadata) -> Self {
        ShardedApksGenerator { config, metadata }
    }

    /// Standalone APKs for devices below Lollipop; none when the base module does not
    /// support them.
    pub fn generate_standalone_shards(&self, modules: &[BundleModule]) -> BundleResult<Vec<ModuleSplit>> {
        let modules = prepare_modules(modules)?;
        let min_sdk = base_module(&modules)?.min_sdk();
        if min_sdk >= versions::LOLLIPOP {
            info!("Skipping standalone APKs, the app requires SDK {}.", min_sdk);
            return Ok(Vec::new());
        }
        let variant = VariantTargeting::sdk_with_alternatives(min_sdk, [versions::LOLLIPOP]);
        let finisher = SplitFinisher::new(&modules, self.metadata);
        self.fuse(&modules, &variant, ShardingMode::Standalone)?
            .into_iter()
            .map(|shard| finisher.finish(shard))
            .collect()
    }

    /// System image APKs: fused shards, optionally with languages split back out, plus
    /// the splits of modules that are not fused.
    pub fn generate_system_apks(&self, modules: &[BundleModule]) -> BundleResult<Vec<ModuleSplit>> {
        let modules = prepare_modules(modules)?;
        let min_sdk = base_module(&modules)?.min_sdk().max(versions::LOLLIPOP);
        let variant = VariantTargeting::sdk(min_sdk);
        let finisher = SplitFinisher::new(&modules, self.metadata);

        let split_languages = self.config.split_languages_out_of_system_shard
            && self.config.is_enabled(OptimizationDimensions::LANGUAGE);
        let language_pipeline = SplittingPipeline::default()
            .with_stage(Box::new(LanguageResourcesSplitter))
            .with_stage(Box::new(AssetsDimensionSplitter::language()));

        let mut apks = Vec::new();
        for shard in self.fuse(&modules, &variant, ShardingMode::System)? {
            let splits = if split_languages {
                language_pipeline.split(&shard)?
            } else {
                vec![shard]
            };
            for mut split in splits {
                // System images never defer languages to on-demand installs.
                split.master_manifest_mutators.clear();
                apks.push(finisher.finish(split)?);
            }
        }

        for module in modules.iter().filter(|module| !module.is_included_in_fusing()) {
            debug!("Module '{}' is not fused, emitting its own splits.", module.name);
            for split in ModuleSplitter::new(module, &variant, self.config).split_module()? {
                apks.push(finisher.finish(split)?);
            }
        }
        Ok(apks)
    }

    fn module_parts(
        &self,
        module: &BundleModule,
        variant: &VariantTargeting,
        split_type: SplitType,
        parts: &mut ShardParts,
    ) -> BundleResult<()> {
        let config = self.config;
        let native = ModuleSplit::for_native_libraries(module, variant).with_split_type(split_type);
        let by_abi = if config.is_enabled(OptimizationDimensions::ABI) {
            AbiNativeLibrariesSplitter::new(config.include_64_bit_libs).split(&native)?
        } else {
            vec![native]
        };
        // Sanitizer builds only ship as config splits.
        let mut native_splits = Vec::new();
        for split in &by_abi {
            native_splits.extend(
                SanitizerNativeLibrariesSplitter
                    .split(split)?
                    .into_iter()
                    .filter(|split| split.apk_targeting.sanitizer.is_none()),
            );
        }
        let resources = ModuleSplit::for_resources(module, variant).with_split_type(split_type);
        let resource_splits = if config.is_enabled(OptimizationDimensions::SCREEN_DENSITY) {
            ScreenDensityResourcesSplitter.split(&resources)?
        } else {
            vec![resources]
        };
        let assets = ModuleSplit::for_assets(module, variant).with_split_type(split_type);
        let assets = AssetsDimensionSplitter::texture_compression_format(&config.texture_suffix_stripping)
            .select_default(&assets);
        let assets = AssetsDimensionSplitter::device_tier(&config.device_tier_suffix_stripping)
            .select_default(&assets);
        let others = [
            assets,
            ModuleSplit::for_dex(module, variant).with_split_type(split_type),
            ModuleSplit::for_root(module, variant).with_split_type(split_type),
        ];
        for split in native_splits.into_iter().chain(resource_splits).chain(others) {
            parts.add(split);
        }
        Ok(())
    }

    /// Shards of the fused modules, not yet finalized.
    fn fuse(
        &self,
        modules: &[BundleModule],
        variant: &VariantTargeting,
        mode: ShardingMode,
    ) -> BundleResult<Vec<ModuleSplit>> {
        let split_type = mode.split_type();
        let fused: Vec<&BundleModule> = modules
            .iter()
            .filter(|module| module.is_included_in_fusing())
            .collect();
        let mut parts = ShardParts::default();
        for module in &fused {
            self.module_parts(module, variant, split_type, &mut parts)?;
        }
        if parts.by_abi.is_empty()
            && self.config.is_enabled(OptimizationDimensions::ABI)
            && !fused.iter().any(|module| module.has_native_libraries())
        {
            for abi in &self.config.placeholder_abis {
                parts.by_abi.insert(*abi, Vec::new());
            }
        }

        let abis: Vec<Abi> = parts.by_abi.keys().copied().collect();
        let densities: Vec<ScreenDensity> = parts.by_density.keys().copied().collect();
        let abi_choices: Vec<Option<Abi>> = if abis.is_empty() {
            vec![None]
        } else {
            abis.iter().copied().map(Some).collect()
        };
        let density_choices: Vec<Option<ScreenDensity>> = if densities.is_empty() {
            vec![None]
        } else {
            densities.iter().copied().map(Some).collect()
        };

        let merger = ModuleSplitsToShardMerger::new(self.config.manifest_merge_mode);
        let mut shards = Vec::new();
        for abi in &abi_choices {
            for density in &density_choices {
                let mut splits = parts.common.clone();
                let mut apk_targeting = ApkTargeting::default();
                let mut shard_variant = variant.clone();
                if let Some(abi) = abi {
                    splits.extend(parts.by_abi.get(abi).into_iter().flatten().cloned());
                    apk_targeting = apk_targeting.with_abi(shard_targeting(abi, &abis));
                    shard_variant = shard_variant.with_abi(shard_targeting(abi, &abis));
                }
                if let Some(density) = density {
                    splits.extend(parts.by_density.get(density).into_iter().flatten().cloned());
                    apk_targeting = apk_targeting.with_screen_density(shard_targeting(density, &densities));
                    shard_variant = shard_variant.with_screen_density(shard_targeting(density, &densities));
                }
                let shard = merger
                    .merge(&splits, split_type)?
                    .with_apk_targeting(apk_targeting)
                    .with_variant_targeting(shard_variant);
                shards.push(shard);
            }
        }
        info!(
            "Generated {} {:?} shards from {} fused modules.",
            shards.len(),
            mode,
            fused.len()
        );
        Ok(shards)
    }
}

fn base_module(modules: &[BundleModule]) -> BundleResult<&BundleModule> {
    match modules.iter().find(|module| module.is_base()) {
        Some(module) => Ok(module),
        None => fail!("Expected to have base module."),
    }
}
