use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROFILES_NAMESPACE: &str = "com.android.tools.build.profiles";
pub const BUNDLETOOL_NAMESPACE: &str = "com.android.tools.build.bundletool";

/// Side-channel files shipped in the bundle next to the modules, keyed by namespace and
/// file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMetadata {
    files: BTreeMap<(String, String), Vec<u8>>,
}

impl BundleMetadata {
    pub fn with_file(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        self.files
            .insert((namespace.into(), name.into()), content.into());
        self
    }

    pub fn file(&self, namespace: &str, name: &str) -> Option<&[u8]> {
        self.files
            .get(&(namespace.to_string(), name.to_string()))
            .map(Vec::as_slice)
    }
}

/// An SDK the app depends on that is installed separately and loaded by the SDK runtime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuntimeEnabledSdk {
    pub package_name: String,
    pub version_major: u32,
    pub version_minor: u32,
    pub certificate_digest: String,
}

impl RuntimeEnabledSdk {
    pub fn new(package_name: impl Into<String>, version_major: u32, version_minor: u32) -> Self {
        RuntimeEnabledSdk {
            package_name: package_name.into(),
            version_major,
            version_minor,
            certificate_digest: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnabledSdkConfig {
    pub sdks: Vec<RuntimeEnabledSdk>,
}

impl RuntimeEnabledSdkConfig {
    pub fn is_empty(&self) -> bool {
        self.sdks.is_empty()
    }
}
