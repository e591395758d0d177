use crate::error::BundleResult;
use crate::model::config::ApkGenerationConfiguration;
use crate::model::metadata::BundleMetadata;
use crate::model::module::BundleModule;
use crate::model::split::ModuleSplit;
use crate::sharding::{prepare_modules, SplitFinisher};
use crate::splitters::ModuleSplitter;
use crate::targeting::VariantTargeting;
use crate::variants::VariantTargetingGenerator;
use log::debug;
use std::collections::BTreeMap;

/// Split APKs of every module, grouped by the variant they are served in.
///
/// Every module is split under every variant of the bundle, so a module that needs no SDK
/// partitioning contributes the same content to each sibling variant.
pub struct SplitApksGenerator<'a> {
    config: &'a ApkGenerationConfiguration,
    metadata: &'a BundleMetadata,
}

impl<'a> SplitApksGenerator<'a> {
    pub fn new(config: &'a ApkGenerationConfiguration, metadata: &'a BundleMetadata) -> Self {
        SplitApksGenerator { config, metadata }
    }

    pub fn generate_split_apks(
        &self,
        modules: &[BundleModule],
    ) -> BundleResult<BTreeMap<VariantTargeting, Vec<ModuleSplit>>> {
        let mut modules = prepare_modules(modules)?;
        modules.sort_by(|a, b| (!a.is_base(), &a.name).cmp(&(!b.is_base(), &b.name)));
        let variants = VariantTargetingGenerator::new(self.config).generate(&modules)?;
        let finisher = SplitFinisher::new(&modules, self.metadata);

        let mut apks = BTreeMap::new();
        for variant in variants {
            let mut splits = Vec::new();
            for module in &modules {
                for split in ModuleSplitter::new(module, &variant, self.config).split_module()? {
                    splits.push(finisher.finish(split)?);
                }
            }
            debug!("Variant {:?} holds {} splits.", variant.min_sdk(), splits.len());
            apks.insert(variant, splits);
        }
        Ok(apks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::manifest::AndroidManifest;
    use crate::android::mutator::ManifestMutator;
    use crate::injectors::RUNTIME_ENABLED_SDK_TABLE_PATH;
    use crate::model::metadata::RuntimeEnabledSdk;
    use crate::model::split::SplitType;

    fn modules() -> Vec<BundleModule> {
        vec![
            BundleModule::new("feature", AndroidManifest::for_package("com.example"))
                .with_entry("assets/feature.bin", vec![1]),
            BundleModule::new("base", AndroidManifest::for_package("com.example"))
                .with_entry("dex/classes.dex", vec![2])
                .with_entry("lib/x86/libfoo.so", vec![3])
                .with_entry("lib/arm64-v8a/libfoo.so", vec![4]),
        ]
    }

    #[test]
    fn splits_are_grouped_by_variant() {
        let config = ApkGenerationConfiguration::default();
        let metadata = BundleMetadata::default();
        let apks = SplitApksGenerator::new(&config, &metadata)
            .generate_split_apks(&modules())
            .unwrap();
        let mins: Vec<_> = apks.keys().filter_map(VariantTargeting::min_sdk).collect();
        assert_eq!(mins, vec![21, 23, 29]);
        for (variant, splits) in &apks {
            assert!(splits.iter().all(|split| &split.variant_targeting == variant));
            assert_eq!(splits[0].module_name, "base");
            assert!(splits[0].is_master);
            let feature_masters = splits
                .iter()
                .filter(|split| split.module_name == "feature" && split.is_master)
                .count();
            assert_eq!(feature_masters, 1);
        }
    }

    #[test]
    fn manifests_are_finalized() {
        let config = ApkGenerationConfiguration::default();
        let metadata = BundleMetadata::default();
        let apks = SplitApksGenerator::new(&config, &metadata)
            .generate_split_apks(&modules())
            .unwrap();
        let splits = &apks[&VariantTargeting::sdk_with_alternatives(23, [21, 29])];
        let base_master = &splits[0];
        assert!(base_master.manifest_mutators.is_empty());
        assert_eq!(
            base_master.manifest.application_attribute("isSplitRequired"),
            Some(&true.into())
        );
        let x86 = splits
            .iter()
            .find(|split| split.find_entry("lib/x86/libfoo.so").is_some())
            .unwrap();
        assert_eq!(x86.manifest.split_id(), Some("config.x86"));
        assert!(x86.entries.iter().all(|entry| entry.force_uncompressed));
        assert_eq!(
            x86.manifest.application_attribute("extractNativeLibs"),
            Some(&false.into())
        );
        let feature = splits.iter().find(|split| split.module_name == "feature").unwrap();
        assert_eq!(feature.manifest.split_id(), Some("feature"));
        assert!(!feature.manifest_mutators.contains(&ManifestMutator::SplitsRequired(true)));
    }

    #[test]
    fn sdk_table_only_in_variants_without_runtime() {
        let config = ApkGenerationConfiguration {
            enable_sdk_runtime_variant: true,
            ..ApkGenerationConfiguration::default()
        };
        let metadata = BundleMetadata::default();
        let mut modules = modules();
        modules[1] = modules[1]
            .clone()
            .with_runtime_enabled_sdk(RuntimeEnabledSdk::new("com.ads", 1, 0));
        let apks = SplitApksGenerator::new(&config, &metadata)
            .generate_split_apks(&modules)
            .unwrap();
        for (variant, splits) in &apks {
            let has_table = splits[0].find_entry(RUNTIME_ENABLED_SDK_TABLE_PATH).is_some();
            assert_eq!(has_table, !variant.requires_sdk_runtime);
        }
        assert!(apks.keys().any(|variant| variant.requires_sdk_runtime));
    }

    #[test]
    fn instant_variant_has_instant_splits() {
        let config = ApkGenerationConfiguration::default().for_instant_apps();
        let metadata = BundleMetadata::default();
        let apks = SplitApksGenerator::new(&config, &metadata)
            .generate_split_apks(&modules())
            .unwrap();
        assert_eq!(apks.len(), 1);
        let splits = apks.values().next().unwrap();
        assert!(splits.iter().all(|split| split.split_type == SplitType::Instant));
        assert!(splits
            .iter()
            .flat_map(|split| &split.entries)
            .all(|entry| !entry.force_uncompressed));
    }
}
