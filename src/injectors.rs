//! Post-splitting injectors appending synthesized entries to base master splits.
//!
//! An injector whose predicate does not hold, or which has nothing to add, hands back the
//! split it received ([`Cow::Borrowed`]) so callers can tell no-ops apart.

use crate::error::BundleResult;
use crate::model::entry::ModuleEntry;
use crate::model::metadata::{
    BundleMetadata, RuntimeEnabledSdkConfig, BUNDLETOOL_NAMESPACE, PROFILES_NAMESPACE,
};
use crate::model::split::{ModuleSplit, SplitType};
use crate::targeting::generator::LIB_DIRECTORY;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;

pub const RUNTIME_ENABLED_SDK_TABLE_PATH: &str = "assets/RuntimeEnabledSdkTable.xml";
pub const BASELINE_PROFILE_PATH: &str = "assets/dexopt/baseline.prof";
pub const BASELINE_PROFILE_METADATA_PATH: &str = "assets/dexopt/baseline.profm";
pub const CODE_TRANSPARENCY_PATH: &str = "META-INF/code_transparency_signed.jwt";
const PLACEHOLDER_LIBRARY: &str = "libplaceholder.so";

pub trait SplitInjector {
    fn inject<'s>(&self, split: &'s ModuleSplit) -> BundleResult<Cow<'s, ModuleSplit>>;
}

/// Runs every injector in order.
pub fn inject_all(injectors: &[&dyn SplitInjector], split: ModuleSplit) -> BundleResult<ModuleSplit> {
    let mut split = split;
    for injector in injectors {
        if let Cow::Owned(injected) = injector.inject(&split)? {
            split = injected;
        }
    }
    Ok(split)
}

fn is_base_master(split: &ModuleSplit) -> bool {
    split.is_base() && split.is_master && split.split_type != SplitType::AssetSlice
}

/// Appends entries whose paths are not present yet; borrowed when nothing was added.
fn append_missing<'s>(split: &'s ModuleSplit, entries: Vec<ModuleEntry>) -> Cow<'s, ModuleSplit> {
    let missing: Vec<ModuleEntry> = entries
        .into_iter()
        .filter(|entry| split.find_entry(&entry.path).is_none())
        .collect();
    if missing.is_empty() {
        return Cow::Borrowed(split);
    }
    let mut injected = split.clone();
    injected.entries.extend(missing);
    Cow::Owned(injected)
}

/// Gives ABI-targeted fused APKs without native code an empty library, so the platform
/// installs them with the targeted ABI.
pub struct AbiPlaceholderInjector;

impl SplitInjector for AbiPlaceholderInjector {
    fn inject<'s>(&self, split: &'s ModuleSplit) -> BundleResult<Cow<'s, ModuleSplit>> {
        let fused = matches!(split.split_type, SplitType::Standalone | SplitType::System);
        let Some(abi) = &split.apk_targeting.abi else {
            return Ok(Cow::Borrowed(split));
        };
        if !fused || !is_base_master(split) || split.entries_under(LIB_DIRECTORY).next().is_some() {
            return Ok(Cow::Borrowed(split));
        }
        let placeholders = abi
            .values
            .iter()
            .map(|abi| {
                ModuleEntry::new(
                    format!("{LIB_DIRECTORY}/{}/{PLACEHOLDER_LIBRARY}", abi.platform_name()),
                    Vec::new(),
                )
            })
            .collect();
        Ok(append_missing(split, placeholders))
    }
}

/// Lists runtime-enabled SDK dependencies for devices that load them without the SDK
/// runtime.
pub struct RuntimeEnabledSdkTableInjector<'a> {
    config: &'a RuntimeEnabledSdkConfig,
}

impl<'a> RuntimeEnabledSdkTableInjector<'a> {
    pub fn new(config: &'a RuntimeEnabledSdkConfig) -> Self {
        RuntimeEnabledSdkTableInjector { config }
    }

    /// The `RuntimeEnabledSdkTable.xml` document, dependencies sorted by package name.
    pub fn table_xml(&self) -> BundleResult<String> {
        let mut packages: Vec<&str> = self
            .config
            .sdks
            .iter()
            .map(|sdk| sdk.package_name.as_str())
            .collect();
        packages.sort_unstable();
        packages.dedup();

        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Start(BytesStart::new("runtime-enabled-sdk-table")))?;
        for package in packages {
            let compat_config = format!("RuntimeEnabledSdk-{package}/CompatSdkConfig.xml");
            writer.write_event(Event::Start(BytesStart::new("runtime-enabled-sdk")))?;
            for (tag, text) in [("package-name", package), ("compat-config-path", compat_config.as_str())] {
                writer.write_event(Event::Start(BytesStart::new(tag)))?;
                writer.write_event(Event::Text(BytesText::new(text)))?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            writer.write_event(Event::End(BytesEnd::new("runtime-enabled-sdk")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("runtime-enabled-sdk-table")))?;
        String::from_utf8(writer.into_inner())
            .map_err(|err| crate::error::BundleError::Xml(err.to_string()))
    }
}

impl SplitInjector for RuntimeEnabledSdkTableInjector<'_> {
    fn inject<'s>(&self, split: &'s ModuleSplit) -> BundleResult<Cow<'s, ModuleSplit>> {
        if self.config.is_empty()
            || !is_base_master(split)
            || split.variant_targeting.requires_sdk_runtime
        {
            return Ok(Cow::Borrowed(split));
        }
        let table = ModuleEntry::new(RUNTIME_ENABLED_SDK_TABLE_PATH, self.table_xml()?.into_bytes());
        Ok(append_missing(split, vec![table]))
    }
}

/// Copies binary ART profiles from the bundle metadata, stored uncompressed.
pub struct BinaryArtProfilesInjector<'a> {
    metadata: &'a BundleMetadata,
}

impl<'a> BinaryArtProfilesInjector<'a> {
    pub fn new(metadata: &'a BundleMetadata) -> Self {
        BinaryArtProfilesInjector { metadata }
    }
}

impl SplitInjector for BinaryArtProfilesInjector<'_> {
    fn inject<'s>(&self, split: &'s ModuleSplit) -> BundleResult<Cow<'s, ModuleSplit>> {
        if !is_base_master(split) {
            return Ok(Cow::Borrowed(split));
        }
        let profiles = [
            ("baseline.prof", BASELINE_PROFILE_PATH),
            ("baseline.profm", BASELINE_PROFILE_METADATA_PATH),
        ]
        .into_iter()
        .filter_map(|(name, path)| {
            let content = self.metadata.file(PROFILES_NAMESPACE, name)?;
            Some(ModuleEntry::new(path, content).with_force_uncompressed(true))
        })
        .collect();
        Ok(append_missing(split, profiles))
    }
}

/// Copies the signed code transparency token from the bundle metadata.
pub struct CodeTransparencyInjector<'a> {
    metadata: &'a BundleMetadata,
}

impl<'a> CodeTransparencyInjector<'a> {
    pub fn new(metadata: &'a BundleMetadata) -> Self {
        CodeTransparencyInjector { metadata }
    }
}

impl SplitInjector for CodeTransparencyInjector<'_> {
    fn inject<'s>(&self, split: &'s ModuleSplit) -> BundleResult<Cow<'s, ModuleSplit>> {
        if !is_base_master(split) {
            return Ok(Cow::Borrowed(split));
        }
        let Some(token) = self
            .metadata
            .file(BUNDLETOOL_NAMESPACE, "code_transparency_signed.jwt")
        else {
            return Ok(Cow::Borrowed(split));
        };
        Ok(append_missing(split, vec![ModuleEntry::new(CODE_TRANSPARENCY_PATH, token)]))
    }
}
