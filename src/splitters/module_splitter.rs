use crate::android::mutator::push_unique;
use crate::error::BundleResult;
use crate::model::config::{ApkGenerationConfiguration, OptimizationDimensions};
use crate::model::module::{BundleModule, ModuleType};
use crate::model::split::{ModuleSplit, SplitType};
use crate::splitters::{
    splitter_for, AssetsDimensionSplitter, DexCompressionSplitter, ModuleSplitSplitter,
    NativeLibrariesCompressionSplitter, OptimizationDimension, SameTargetingMerger,
    SplittingPipeline,
};
use crate::targeting::VariantTargeting;
use log::debug;

/// Turns one module into its splits for one variant.
pub struct ModuleSplitter<'a> {
    module: &'a BundleModule,
    variant: &'a VariantTargeting,
    config: &'a ApkGenerationConfiguration,
}

impl<'a> ModuleSplitter<'a> {
    pub fn new(
        module: &'a BundleModule,
        variant: &'a VariantTargeting,
        config: &'a ApkGenerationConfiguration,
    ) -> Self {
        ModuleSplitter {
            module,
            variant,
            config,
        }
    }

    fn dimension_stage(
        &self,
        pipeline: SplittingPipeline,
        flag: OptimizationDimensions,
        dimension: OptimizationDimension,
    ) -> SplittingPipeline {
        if self.config.is_enabled(flag) {
            pipeline.with_stage(splitter_for(dimension, self.config))
        } else {
            pipeline
        }
    }

    fn native_pipeline(&self) -> SplittingPipeline {
        let mut pipeline = SplittingPipeline::default();
        if self.config.is_enabled(OptimizationDimensions::ABI) {
            pipeline = pipeline
                .with_stage(splitter_for(OptimizationDimension::Abi, self.config))
                .with_stage(splitter_for(OptimizationDimension::Sanitizer, self.config));
        }
        pipeline.with_stage(Box::new(NativeLibrariesCompressionSplitter::new(self.config)))
    }

    fn resources_pipeline(&self) -> SplittingPipeline {
        let pipeline = self.dimension_stage(
            SplittingPipeline::default(),
            OptimizationDimensions::SCREEN_DENSITY,
            OptimizationDimension::ScreenDensity,
        );
        if self.config.is_enabled(OptimizationDimensions::LANGUAGE) {
            pipeline.with_stage(Box::new(crate::splitters::LanguageResourcesSplitter))
        } else {
            pipeline
        }
    }

    fn assets_pipeline(&self) -> SplittingPipeline {
        let mut pipeline = SplittingPipeline::default();
        if self.config.is_enabled(OptimizationDimensions::LANGUAGE) {
            pipeline = pipeline.with_stage(Box::new(AssetsDimensionSplitter::language()));
        }
        let pipeline = self.dimension_stage(
            pipeline,
            OptimizationDimensions::TEXTURE_COMPRESSION_FORMAT,
            OptimizationDimension::TextureCompressionFormat,
        );
        self.dimension_stage(
            pipeline,
            OptimizationDimensions::DEVICE_TIER,
            OptimizationDimension::DeviceTier,
        )
    }

    fn prepare(&self, split: ModuleSplit) -> ModuleSplit {
        if self.config.for_instant_app_variants {
            split.with_split_type(SplitType::Instant)
        } else {
            split
        }
    }

    pub fn split_module(&self) -> BundleResult<Vec<ModuleSplit>> {
        let module = self.module;
        let variant = self.variant;
        let mut splits = Vec::new();
        if module.module_type == ModuleType::AssetOnly {
            splits.extend(self.assets_pipeline().split(&ModuleSplit::for_assets(module, variant))?);
        } else {
            let stages: [(ModuleSplit, SplittingPipeline); 5] = [
                (ModuleSplit::for_native_libraries(module, variant), self.native_pipeline()),
                (ModuleSplit::for_resources(module, variant), self.resources_pipeline()),
                (ModuleSplit::for_assets(module, variant), self.assets_pipeline()),
                (
                    ModuleSplit::for_dex(module, variant),
                    SplittingPipeline::default()
                        .with_stage(Box::new(DexCompressionSplitter::new(self.config))),
                ),
                (ModuleSplit::for_root(module, variant), SplittingPipeline::default()),
            ];
            for (split, pipeline) in stages {
                splits.extend(pipeline.split(&self.prepare(split))?);
            }
        }

        let merged = SameTargetingMerger.merge(splits)?;
        let splits = move_master_mutators(merged);
        debug!(
            "Module '{}' produced {} splits for variant {:?}.",
            module.name,
            splits.len(),
            variant.min_sdk()
        );
        Ok(splits)
    }
}

/// Queues the edits config splits requested for the master split on the master split.
fn move_master_mutators(mut splits: Vec<ModuleSplit>) -> Vec<ModuleSplit> {
    let requested: Vec<_> = splits
        .iter_mut()
        .flat_map(|split| std::mem::take(&mut split.master_manifest_mutators))
        .collect();
    if let Some(master) = splits.iter_mut().find(|split| split.is_master) {
        for mutator in requested {
            push_unique(&mut master.manifest_mutators, mutator);
        }
    }
    splits
}
