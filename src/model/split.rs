//! The unit every splitter consumes and produces.

use crate::android::manifest::AndroidManifest;
use crate::android::manifest_merger::BASE_MODULE_NAME;
use crate::android::mutator::{push_unique, ManifestMutator};
use crate::model::entry::ModuleEntry;
use crate::model::module::{BundleModule, ModuleType, DEX_DIRECTORY, RESOURCES_DIRECTORY};
use crate::resources::table::ResourceTable;
use crate::targeting::directories::{Assets, NativeLibraries};
use crate::targeting::generator::{ASSETS_DIRECTORY, LIB_DIRECTORY};
use crate::targeting::{ApkTargeting, VariantTargeting};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SplitType {
    #[default]
    Split,
    Instant,
    Standalone,
    System,
    AssetSlice,
}

/// A partition of one module's content with the targeting it is delivered for.
///
/// Splits are values: splitters build new splits through the `with_*` builders and leave
/// their input untouched. Manifest edits are queued as [`ManifestMutator`]s and only land
/// in the manifest when [`ModuleSplit::finalize`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSplit {
    pub module_name: String,
    pub entries: Vec<ModuleEntry>,
    pub manifest: AndroidManifest,
    pub manifest_mutators: Vec<ManifestMutator>,
    /// Edits a config split needs on the master split of its module.
    pub master_manifest_mutators: Vec<ManifestMutator>,
    pub apk_targeting: ApkTargeting,
    pub variant_targeting: VariantTargeting,
    pub split_type: SplitType,
    pub is_master: bool,
    pub resource_table: Option<ResourceTable>,
    pub native_config: Option<NativeLibraries>,
    pub assets_config: Option<Assets>,
}

impl ModuleSplit {
    fn from_module(
        module: &BundleModule,
        variant: &VariantTargeting,
        entries: Vec<ModuleEntry>,
        is_master: bool,
    ) -> Self {
        let split_type = match module.module_type {
            ModuleType::AssetOnly => SplitType::AssetSlice,
            _ => SplitType::Split,
        };
        ModuleSplit {
            module_name: module.name.clone(),
            entries,
            manifest: module.manifest.clone(),
            manifest_mutators: Vec::new(),
            master_manifest_mutators: Vec::new(),
            apk_targeting: ApkTargeting::default(),
            variant_targeting: variant.clone(),
            split_type,
            is_master,
            resource_table: None,
            native_config: None,
            assets_config: None,
        }
    }

    fn module_entries_under(module: &BundleModule, directory: &str) -> Vec<ModuleEntry> {
        module.entries_under(directory).cloned().collect()
    }

    /// Whole module as a single master split.
    pub fn for_module(module: &BundleModule, variant: &VariantTargeting) -> Self {
        let mut split = ModuleSplit::from_module(module, variant, module.entries.clone(), true);
        split.resource_table = module.resource_table.clone();
        split.native_config = module.native_config.clone();
        split.assets_config = module.assets_config.clone();
        split
    }

    /// `lib/` entries; native splits are config splits.
    pub fn for_native_libraries(module: &BundleModule, variant: &VariantTargeting) -> Self {
        let entries = ModuleSplit::module_entries_under(module, LIB_DIRECTORY);
        let mut split = ModuleSplit::from_module(module, variant, entries, false);
        split.native_config = module.native_config.clone();
        split
    }

    pub fn for_dex(module: &BundleModule, variant: &VariantTargeting) -> Self {
        let entries = ModuleSplit::module_entries_under(module, DEX_DIRECTORY);
        ModuleSplit::from_module(module, variant, entries, true)
    }

    pub fn for_assets(module: &BundleModule, variant: &VariantTargeting) -> Self {
        let entries = ModuleSplit::module_entries_under(module, ASSETS_DIRECTORY);
        let mut split = ModuleSplit::from_module(module, variant, entries, true);
        split.assets_config = module.assets_config.clone();
        split
    }

    pub fn for_resources(module: &BundleModule, variant: &VariantTargeting) -> Self {
        let entries = ModuleSplit::module_entries_under(module, RESOURCES_DIRECTORY);
        let mut split = ModuleSplit::from_module(module, variant, entries, true);
        split.resource_table = module.resource_table.clone();
        split
    }

    /// Everything not covered by the other resource kinds (root files, manifest-side data).
    pub fn for_root(module: &BundleModule, variant: &VariantTargeting) -> Self {
        let entries = module
            .entries
            .iter()
            .filter(|entry| {
                ![LIB_DIRECTORY, DEX_DIRECTORY, ASSETS_DIRECTORY, RESOURCES_DIRECTORY]
                    .iter()
                    .any(|directory| entry.is_under(directory))
            })
            .cloned()
            .collect();
        ModuleSplit::from_module(module, variant, entries, true)
    }

    pub fn with_entries(mut self, entries: Vec<ModuleEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_apk_targeting(mut self, targeting: ApkTargeting) -> Self {
        self.apk_targeting = targeting;
        self
    }

    pub fn with_variant_targeting(mut self, targeting: VariantTargeting) -> Self {
        self.variant_targeting = targeting;
        self
    }

    pub fn with_master(mut self, is_master: bool) -> Self {
        self.is_master = is_master;
        self
    }

    pub fn with_split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = split_type;
        self
    }

    pub fn with_resource_table(mut self, table: Option<ResourceTable>) -> Self {
        self.resource_table = table;
        self
    }

    pub fn with_assets_config(mut self, config: Option<Assets>) -> Self {
        self.assets_config = config;
        self
    }

    pub fn with_manifest(mut self, manifest: AndroidManifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_manifest_mutator(mut self, mutator: ManifestMutator) -> Self {
        push_unique(&mut self.manifest_mutators, mutator);
        self
    }

    pub fn with_master_manifest_mutator(mut self, mutator: ManifestMutator) -> Self {
        push_unique(&mut self.master_manifest_mutators, mutator);
        self
    }

    pub fn is_base(&self) -> bool {
        self.module_name == BASE_MODULE_NAME
    }

    pub fn entries_under<'a>(&'a self, directory: &'a str) -> impl Iterator<Item = &'a ModuleEntry> {
        self.entries.iter().filter(move |entry| entry.is_under(directory))
    }

    pub fn find_entry(&self, path: &str) -> Option<&ModuleEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// Id written to the `split` attribute of the manifest, `None` for base masters and
    /// standalone APKs.
    pub fn split_id(&self) -> Option<String> {
        if self.split_type == SplitType::Standalone {
            return None;
        }
        if self.is_master {
            return (!self.is_base()).then(|| self.module_name.clone());
        }
        let suffix = self.apk_targeting.suffix();
        if self.is_base() || self.split_type == SplitType::System {
            Some(format!("config.{suffix}"))
        } else {
            Some(format!("{}.config.{suffix}", self.module_name))
        }
    }

    /// Applies the queued manifest edits and writes the split id into the manifest.
    pub fn finalize(mut self) -> ModuleSplit {
        for mutator in std::mem::take(&mut self.manifest_mutators) {
            mutator.apply(&mut self.manifest);
        }
        if let Some(split_id) = self.split_id() {
            self.manifest.set_split_id(split_id);
        }
        if !self.is_master && !self.is_base() && self.split_type != SplitType::System {
            self.manifest.set_config_for_split(self.module_name.clone());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::manifest::ManifestValue;
    use crate::targeting::{Abi, Targeting};

    fn module(name: &str) -> BundleModule {
        BundleModule::new(name, AndroidManifest::for_package("com.example"))
            .with_entry("lib/x86/libfoo.so", vec![1])
            .with_entry("dex/classes.dex", vec![2])
            .with_entry("assets/a.txt", vec![3])
            .with_entry("res/drawable/icon.png", vec![4])
            .with_entry("root/extra.bin", vec![5])
    }

    #[test]
    fn resource_kinds_partition_the_module() {
        let module = module("base");
        let variant = VariantTargeting::l_plus();
        let kinds = [
            ModuleSplit::for_native_libraries(&module, &variant),
            ModuleSplit::for_dex(&module, &variant),
            ModuleSplit::for_assets(&module, &variant),
            ModuleSplit::for_resources(&module, &variant),
            ModuleSplit::for_root(&module, &variant),
        ];
        let total: usize = kinds.iter().map(|split| split.entries.len()).sum();
        assert_eq!(total, module.entries.len());
        assert!(!kinds[0].is_master);
        assert!(kinds[1].is_master);
    }

    #[test]
    fn split_ids_follow_module_and_targeting() {
        let variant = VariantTargeting::l_plus();
        let x86 = ApkTargeting::default().with_abi(Targeting::value(Abi::X86));
        let base_config = ModuleSplit::for_native_libraries(&module("base"), &variant)
            .with_apk_targeting(x86.clone());
        assert_eq!(base_config.split_id().as_deref(), Some("config.x86"));
        let feature_config = ModuleSplit::for_native_libraries(&module("camera"), &variant)
            .with_apk_targeting(x86);
        assert_eq!(feature_config.split_id().as_deref(), Some("camera.config.x86"));
        assert_eq!(ModuleSplit::for_dex(&module("base"), &variant).split_id(), None);
        assert_eq!(
            ModuleSplit::for_dex(&module("camera"), &variant).split_id().as_deref(),
            Some("camera")
        );
    }

    #[test]
    fn finalize_applies_mutators_once() {
        let split = ModuleSplit::for_dex(&module("camera"), &VariantTargeting::l_plus())
            .with_manifest_mutator(ManifestMutator::ExtractNativeLibs(false))
            .finalize();
        assert!(split.manifest_mutators.is_empty());
        assert_eq!(split.manifest.split_id(), Some("camera"));
        assert_eq!(
            split.manifest.application_attribute("extractNativeLibs"),
            Some(&ManifestValue::Boolean(false))
        );
    }
}
