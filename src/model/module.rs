use crate::android::manifest::AndroidManifest;
use crate::android::manifest_merger::BASE_MODULE_NAME;
use crate::error::BundleResult;
use crate::model::entry::ModuleEntry;
use crate::model::metadata::{RuntimeEnabledSdk, RuntimeEnabledSdkConfig};
use crate::resources::table::ResourceTable;
use crate::targeting::directories::{Assets, NativeLibraries};
use crate::targeting::generator::{generate_assets_targeting, generate_native_targeting};
use serde::{Deserialize, Serialize};

pub const DEX_DIRECTORY: &str = "dex";
pub const RESOURCES_DIRECTORY: &str = "res";
pub const ROOT_DIRECTORY: &str = "root";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    #[default]
    Feature,
    /// Assets delivered as asset packs, no code or resources.
    AssetOnly,
    /// A runtime-enabled SDK bundled into the app for pre-runtime devices.
    SdkDependency,
}

/// One module of a bundle as read by the bundle reader. Never modified by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleModule {
    pub name: String,
    pub module_type: ModuleType,
    pub manifest: AndroidManifest,
    pub entries: Vec<ModuleEntry>,
    pub resource_table: Option<ResourceTable>,
    pub native_config: Option<NativeLibraries>,
    pub assets_config: Option<Assets>,
    pub runtime_enabled_sdks: RuntimeEnabledSdkConfig,
}

impl BundleModule {
    pub fn new(name: impl Into<String>, manifest: AndroidManifest) -> Self {
        BundleModule {
            name: name.into(),
            module_type: ModuleType::default(),
            manifest,
            entries: Vec::new(),
            resource_table: None,
            native_config: None,
            assets_config: None,
            runtime_enabled_sdks: RuntimeEnabledSdkConfig::default(),
        }
    }

    pub fn with_module_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = module_type;
        self
    }

    pub fn with_entry(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.entries.push(ModuleEntry::new(path, content));
        self
    }

    pub fn with_resource_table(mut self, table: ResourceTable) -> Self {
        self.resource_table = Some(table);
        self
    }

    pub fn with_native_config(mut self, config: NativeLibraries) -> Self {
        self.native_config = Some(config);
        self
    }

    pub fn with_assets_config(mut self, config: Assets) -> Self {
        self.assets_config = Some(config);
        self
    }

    pub fn with_runtime_enabled_sdk(mut self, sdk: RuntimeEnabledSdk) -> Self {
        self.runtime_enabled_sdks.sdks.push(sdk);
        self
    }

    /// Fills the native and assets configs that were not provided from the entry paths.
    pub fn with_generated_targeting(mut self) -> BundleResult<Self> {
        if self.native_config.is_none() {
            self.native_config = generate_native_targeting(self.paths())?;
        }
        if self.assets_config.is_none() {
            self.assets_config = generate_assets_targeting(self.paths())?;
        }
        Ok(self)
    }

    fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.path.as_str())
    }

    pub fn is_base(&self) -> bool {
        self.name == BASE_MODULE_NAME
    }

    pub fn entries_under<'a>(&'a self, directory: &'a str) -> impl Iterator<Item = &'a ModuleEntry> {
        self.entries.iter().filter(move |entry| entry.is_under(directory))
    }

    pub fn has_native_libraries(&self) -> bool {
        self.entries_under(crate::targeting::generator::LIB_DIRECTORY).next().is_some()
    }

    pub fn has_dex(&self) -> bool {
        self.entries_under(DEX_DIRECTORY).next().is_some()
    }

    /// Declared min SDK, 1 when the manifest leaves it out.
    pub fn min_sdk(&self) -> u32 {
        self.manifest.min_sdk_version().unwrap_or(1)
    }

    pub fn max_sdk(&self) -> Option<u32> {
        self.manifest.max_sdk_version()
    }

    /// Whether the module's content goes into standalone and system shards. Asset packs
    /// are delivered on their own and never fused.
    pub fn is_included_in_fusing(&self) -> bool {
        if self.module_type == ModuleType::AssetOnly {
            return false;
        }
        self.is_base() || self.manifest.is_fused().unwrap_or(true)
    }
}
