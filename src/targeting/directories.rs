use crate::targeting::{Abi, Sanitizer, TextureCompressionFormat};

/// Dimension values a `lib/` directory is tagged with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NativeDirectoryTargeting {
    pub abi: Option<Abi>,
    pub sanitizer: Option<Sanitizer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetedNativeDirectory {
    pub path: String,
    pub targeting: NativeDirectoryTargeting,
}

/// Targeting config of a module's native libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeLibraries {
    pub directories: Vec<TargetedNativeDirectory>,
}

impl NativeLibraries {
    pub fn directory(mut self, path: impl Into<String>, abi: Abi) -> Self {
        self.directories.push(TargetedNativeDirectory {
            path: path.into(),
            targeting: NativeDirectoryTargeting {
                abi: Some(abi),
                sanitizer: None,
            },
        });
        self
    }

    pub fn sanitizer_directory(
        mut self,
        path: impl Into<String>,
        abi: Abi,
        sanitizer: Sanitizer,
    ) -> Self {
        self.directories.push(TargetedNativeDirectory {
            path: path.into(),
            targeting: NativeDirectoryTargeting {
                abi: Some(abi),
                sanitizer: Some(sanitizer),
            },
        });
        self
    }
}

/// Dimension values an `assets/` directory is tagged with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AssetsDirectoryTargeting {
    pub language: Option<String>,
    pub texture_compression_format: Option<TextureCompressionFormat>,
    pub device_tier: Option<u32>,
}

impl AssetsDirectoryTargeting {
    pub fn is_empty(&self) -> bool {
        *self == AssetsDirectoryTargeting::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetedAssetsDirectory {
    pub path: String,
    pub targeting: AssetsDirectoryTargeting,
}

/// Targeting config of a module's assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    pub directories: Vec<TargetedAssetsDirectory>,
}

impl Assets {
    pub fn directory(mut self, path: impl Into<String>, targeting: AssetsDirectoryTargeting) -> Self {
        self.directories.push(TargetedAssetsDirectory {
            path: path.into(),
            targeting,
        });
        self
    }

    /// Directories of both configs, each once.
    pub fn union(mut self, other: &Assets) -> Self {
        for directory in &other.directories {
            if !self.directories.contains(directory) {
                self.directories.push(directory.clone());
            }
        }
        self
    }
}

/// Union of two optional configs.
pub fn union_assets(a: Option<Assets>, b: Option<&Assets>) -> Option<Assets> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (a, b) => a.or_else(|| b.cloned()),
    }
}

/// Directory part of an entry path, `""` for root-level entries.
pub(crate) fn parent_directory(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
