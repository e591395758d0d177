//! Targeting values attached to splits and variants.
//!
//! A [`Targeting`] asserts a set of values for one dimension together with the sibling
//! values the same split explicitly excludes. [`ApkTargeting`] and [`VariantTargeting`]
//! combine several dimensions into the targeting of an APK and of a variant.

pub mod dimensions;
pub mod directories;
pub mod generator;

pub use dimensions::{Abi, Sanitizer, ScreenDensity, TextureCompressionFormat};

use crate::error::BundleResult;
use std::collections::BTreeSet;
use std::fmt;

/// Android API levels the splitting logic cares about.
pub mod versions {
    pub const LOLLIPOP: u32 = 21;
    pub const MARSHMALLOW: u32 = 23;
    pub const P: u32 = 28;
    pub const Q: u32 = 29;
    pub const S: u32 = 31;
    pub const S_V2: u32 = 32;
    pub const T: u32 = 33;
}

/// `(value, alternatives)` assertion for a single targeting dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Targeting<T: Ord> {
    pub values: BTreeSet<T>,
    pub alternatives: BTreeSet<T>,
}

impl<T: Ord + Clone> Targeting<T> {
    pub fn value(value: T) -> Self {
        let mut values = BTreeSet::new();
        values.insert(value);
        Targeting {
            values,
            alternatives: BTreeSet::new(),
        }
    }

    /// Builds a targeting whose alternatives never contain the value itself.
    pub fn with_alternatives(value: T, alternatives: impl IntoIterator<Item = T>) -> Self {
        let alternatives = alternatives
            .into_iter()
            .filter(|alternative| *alternative != value)
            .collect();
        let mut targeting = Targeting::value(value);
        targeting.alternatives = alternatives;
        targeting
    }

    pub fn single_value(&self) -> Option<&T> {
        if self.values.len() == 1 {
            self.values.iter().next()
        } else {
            None
        }
    }
}

fn merge_dimension<T: PartialEq + Clone + fmt::Debug>(
    dimension: &str,
    first: &Option<T>,
    second: &Option<T>,
) -> BundleResult<Option<T>> {
    match (first, second) {
        (Some(a), Some(b)) if a != b => {
            fail!(
                "Cannot merge targetings with conflicting {} dimension: {:?} and {:?}.",
                dimension,
                a,
                b
            );
        }
        (Some(a), _) => Ok(Some(a.clone())),
        (None, b) => Ok(b.clone()),
    }
}

/// Targeting of a single APK: a conjunction of per-dimension assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApkTargeting {
    pub abi: Option<Targeting<Abi>>,
    pub screen_density: Option<Targeting<ScreenDensity>>,
    pub language: Option<Targeting<String>>,
    pub texture_compression_format: Option<Targeting<TextureCompressionFormat>>,
    pub device_tier: Option<Targeting<u32>>,
    pub sanitizer: Option<Targeting<Sanitizer>>,
    pub sdk_version: Option<Targeting<u32>>,
}

impl ApkTargeting {
    pub fn is_default(&self) -> bool {
        *self == ApkTargeting::default()
    }

    /// Field-wise union; a dimension present on both sides must be identical.
    pub fn merge(&self, other: &ApkTargeting) -> BundleResult<ApkTargeting> {
        Ok(ApkTargeting {
            abi: merge_dimension("ABI", &self.abi, &other.abi)?,
            screen_density: merge_dimension(
                "screen density",
                &self.screen_density,
                &other.screen_density,
            )?,
            language: merge_dimension("language", &self.language, &other.language)?,
            texture_compression_format: merge_dimension(
                "texture compression format",
                &self.texture_compression_format,
                &other.texture_compression_format,
            )?,
            device_tier: merge_dimension("device tier", &self.device_tier, &other.device_tier)?,
            sanitizer: merge_dimension("sanitizer", &self.sanitizer, &other.sanitizer)?,
            sdk_version: merge_dimension("SDK version", &self.sdk_version, &other.sdk_version)?,
        })
    }

    pub fn with_abi(mut self, targeting: Targeting<Abi>) -> Self {
        self.abi = Some(targeting);
        self
    }

    pub fn with_screen_density(mut self, targeting: Targeting<ScreenDensity>) -> Self {
        self.screen_density = Some(targeting);
        self
    }

    pub fn with_language(mut self, targeting: Targeting<String>) -> Self {
        self.language = Some(targeting);
        self
    }

    pub fn with_texture_compression_format(
        mut self,
        targeting: Targeting<TextureCompressionFormat>,
    ) -> Self {
        self.texture_compression_format = Some(targeting);
        self
    }

    pub fn with_device_tier(mut self, targeting: Targeting<u32>) -> Self {
        self.device_tier = Some(targeting);
        self
    }

    pub fn with_sanitizer(mut self, targeting: Targeting<Sanitizer>) -> Self {
        self.sanitizer = Some(targeting);
        self
    }

    pub fn with_sdk_version(mut self, targeting: Targeting<u32>) -> Self {
        self.sdk_version = Some(targeting);
        self
    }

    /// Name fragment used in split ids, e.g. `arm64_v8a` or `xhdpi`.
    pub fn suffix(&self) -> String {
        let mut parts = Vec::new();
        if let Some(abi) = &self.abi {
            parts.extend(abi.values.iter().map(|abi| abi.platform_name().replace('-', "_")));
        }
        if let Some(sanitizer) = &self.sanitizer {
            parts.extend(sanitizer.values.iter().map(ToString::to_string));
        }
        if let Some(density) = &self.screen_density {
            parts.extend(density.values.iter().map(ToString::to_string));
        }
        if let Some(language) = &self.language {
            parts.extend(language.values.iter().cloned());
        }
        if let Some(format) = &self.texture_compression_format {
            parts.extend(format.values.iter().map(ToString::to_string));
        }
        if let Some(tier) = &self.device_tier {
            parts.extend(tier.values.iter().map(|tier| format!("tier_{tier}")));
        }
        parts.join("_")
    }
}

/// Targeting of a variant: an SDK range, optionally refined by the SDK runtime flag and,
/// for sharded outputs, by ABI and screen density.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantTargeting {
    pub sdk_version: Option<Targeting<u32>>,
    pub abi: Option<Targeting<Abi>>,
    pub screen_density: Option<Targeting<ScreenDensity>>,
    pub requires_sdk_runtime: bool,
}

impl VariantTargeting {
    pub fn sdk(min_sdk: u32) -> Self {
        VariantTargeting {
            sdk_version: Some(Targeting::value(min_sdk)),
            ..VariantTargeting::default()
        }
    }

    pub fn sdk_with_alternatives(min_sdk: u32, alternatives: impl IntoIterator<Item = u32>) -> Self {
        VariantTargeting {
            sdk_version: Some(Targeting::with_alternatives(min_sdk, alternatives)),
            ..VariantTargeting::default()
        }
    }

    /// The variant serving every device from Lollipop on when nothing is optimized.
    pub fn l_plus() -> Self {
        VariantTargeting::sdk(versions::LOLLIPOP)
    }

    /// Minimum SDK of the range, `None` while no SDK partitioning has happened.
    pub fn min_sdk(&self) -> Option<u32> {
        self.sdk_version
            .as_ref()
            .and_then(|targeting| targeting.values.iter().next().copied())
    }

    pub fn is_sdk_pinned(&self) -> bool {
        self.min_sdk().is_some()
    }

    pub fn with_sdk_runtime(mut self, requires_sdk_runtime: bool) -> Self {
        self.requires_sdk_runtime = requires_sdk_runtime;
        self
    }

    pub fn with_abi(mut self, targeting: Targeting<Abi>) -> Self {
        self.abi = Some(targeting);
        self
    }

    pub fn with_screen_density(mut self, targeting: Targeting<ScreenDensity>) -> Self {
        self.screen_density = Some(targeting);
        self
    }
}
