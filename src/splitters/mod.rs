//! Splitters partition the entries of a [`ModuleSplit`] into config splits.
//!
//! Every splitter maps one split to a collection of splits and never edits its input.
//! A splitter with nothing to do returns the input alone.

pub mod abi;
pub mod assets_dimension;
pub mod compression;
pub mod density;
pub mod language;
pub mod module_splitter;
pub mod same_targeting;
pub mod sanitizer;

use crate::android::mutator::ManifestMutator;
use crate::error::BundleResult;
use crate::model::config::ApkGenerationConfiguration;
use crate::model::split::ModuleSplit;
use log::debug;

pub use abi::AbiNativeLibrariesSplitter;
pub use assets_dimension::AssetsDimensionSplitter;
pub use compression::{DexCompressionSplitter, NativeLibrariesCompressionSplitter};
pub use density::ScreenDensityResourcesSplitter;
pub use language::LanguageResourcesSplitter;
pub use module_splitter::ModuleSplitter;
pub use same_targeting::SameTargetingMerger;
pub use sanitizer::SanitizerNativeLibrariesSplitter;

pub trait ModuleSplitSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>>;
}

/// Runs stages one after another, feeding every output of a stage to the next one.
#[derive(Default)]
pub struct SplittingPipeline {
    stages: Vec<Box<dyn ModuleSplitSplitter>>,
}

impl SplittingPipeline {
    pub fn new(stages: Vec<Box<dyn ModuleSplitSplitter>>) -> Self {
        SplittingPipeline { stages }
    }

    pub fn with_stage(mut self, stage: Box<dyn ModuleSplitSplitter>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl ModuleSplitSplitter for SplittingPipeline {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        let mut splits = vec![split.clone()];
        for stage in &self.stages {
            let mut next = Vec::with_capacity(splits.len());
            for split in &splits {
                next.extend(stage.split(split)?);
            }
            splits = next;
        }
        debug!(
            "Split '{}' into {} splits over {} stages.",
            split.module_name,
            splits.len(),
            self.stages.len()
        );
        Ok(splits)
    }
}

/// Dimensions with a dedicated splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptimizationDimension {
    Abi,
    ScreenDensity,
    Language,
    TextureCompressionFormat,
    DeviceTier,
    Sanitizer,
}

/// Builds the splitter of a dimension with the settings of `config`.
pub fn splitter_for(
    dimension: OptimizationDimension,
    config: &ApkGenerationConfiguration,
) -> Box<dyn ModuleSplitSplitter> {
    match dimension {
        OptimizationDimension::Abi => {
            Box::new(AbiNativeLibrariesSplitter::new(config.include_64_bit_libs))
        }
        OptimizationDimension::Sanitizer => Box::new(SanitizerNativeLibrariesSplitter),
        OptimizationDimension::ScreenDensity => Box::new(ScreenDensityResourcesSplitter),
        OptimizationDimension::Language => Box::new(SplittingPipeline::new(vec![
            Box::new(LanguageResourcesSplitter),
            Box::new(AssetsDimensionSplitter::language()),
        ])),
        OptimizationDimension::TextureCompressionFormat => Box::new(
            AssetsDimensionSplitter::texture_compression_format(&config.texture_suffix_stripping),
        ),
        OptimizationDimension::DeviceTier => Box::new(AssetsDimensionSplitter::device_tier(
            &config.device_tier_suffix_stripping,
        )),
    }
}

/// Queues `isSplitRequired=true` for the master split when a dimension fanned out into
/// more than one concrete value.
pub(crate) fn require_splits_when_fanned_out(
    splits: Vec<ModuleSplit>,
    concrete_values: usize,
) -> Vec<ModuleSplit> {
    if concrete_values <= 1 {
        return splits;
    }
    splits
        .into_iter()
        .map(|split| split.with_master_manifest_mutator(ManifestMutator::SplitsRequired(true)))
        .collect()
}
