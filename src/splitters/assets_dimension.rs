//! One splitter for every assets dimension, parameterised by how a value is read from a
//! directory's targeting and how it is turned into APK targeting.

use crate::error::BundleResult;
use crate::model::config::SuffixStripping;
use crate::model::entry::ModuleEntry;
use crate::model::split::ModuleSplit;
use crate::splitters::{require_splits_when_fanned_out, ModuleSplitSplitter};
use crate::targeting::directories::{union_assets, Assets, AssetsDirectoryTargeting};
use crate::targeting::generator::strip_targeting_suffixes;
use crate::targeting::{ApkTargeting, Targeting, TextureCompressionFormat};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt::Debug;

pub struct AssetsDimensionSplitter<T: Ord> {
    extract_value: fn(&AssetsDirectoryTargeting) -> Option<T>,
    build_targeting: fn(Targeting<T>) -> ApkTargeting,
    /// Directory tag key, `tcf` in `#tcf_astc`.
    suffix_key: &'static str,
    strip_suffix: bool,
    default_value: Option<T>,
    /// Value that always gets a split once the dimension is in use, even without content.
    always_present: Option<T>,
}

impl<T: Ord + Clone + Debug> AssetsDimensionSplitter<T> {
    pub fn new(
        extract_value: fn(&AssetsDirectoryTargeting) -> Option<T>,
        build_targeting: fn(Targeting<T>) -> ApkTargeting,
        suffix_key: &'static str,
    ) -> Self {
        AssetsDimensionSplitter {
            extract_value,
            build_targeting,
            suffix_key,
            strip_suffix: false,
            default_value: None,
            always_present: None,
        }
    }

    pub fn with_suffix_stripping(mut self, default_value: Option<T>) -> Self {
        self.strip_suffix = true;
        self.default_value = default_value;
        self
    }

    pub fn with_always_present(mut self, value: T) -> Self {
        self.always_present = Some(value);
        self
    }

    fn output_path(&self, entry: &ModuleEntry) -> ModuleEntry {
        if self.strip_suffix {
            let path = strip_targeting_suffixes(&entry.path, self.suffix_key);
            entry.clone().with_path(path)
        } else {
            entry.clone()
        }
    }

    /// Assets config of an output split: directories tagged with `value` (renamed when
    /// stripping), or the directories this dimension leaves untagged for `None`.
    fn config_for(&self, split: &ModuleSplit, value: Option<&T>) -> Option<Assets> {
        let config = split.assets_config.as_ref()?;
        let directories: Vec<_> = config
            .directories
            .iter()
            .filter(|dir| (self.extract_value)(&dir.targeting).as_ref() == value)
            .map(|dir| {
                let mut dir = dir.clone();
                if value.is_some() && self.strip_suffix {
                    dir.path = strip_targeting_suffixes(&dir.path, self.suffix_key);
                }
                dir
            })
            .collect();
        (!directories.is_empty()).then_some(Assets { directories })
    }

    /// Groups the split's assets by dimension value; entries of untagged directories are
    /// returned separately.
    fn group_entries(&self, split: &ModuleSplit) -> (BTreeMap<T, Vec<ModuleEntry>>, Vec<ModuleEntry>) {
        let mut groups: BTreeMap<T, Vec<ModuleEntry>> = BTreeMap::new();
        let mut unclaimed = Vec::new();
        let Some(config) = &split.assets_config else {
            return (groups, split.entries.clone());
        };
        for entry in &split.entries {
            let value = config
                .directories
                .iter()
                .find(|dir| dir.path == entry.directory())
                .and_then(|dir| (self.extract_value)(&dir.targeting));
            match value {
                Some(value) => groups.entry(value).or_default().push(entry.clone()),
                None => unclaimed.push(entry.clone()),
            }
        }
        (groups, unclaimed)
    }

    /// Keeps untagged assets and the default value's assets, the way a fused APK without
    /// config splits needs them. Without a default value every asset is kept.
    pub fn select_default(&self, split: &ModuleSplit) -> ModuleSplit {
        let Some(default) = &self.default_value else {
            return split.clone();
        };
        let (mut groups, mut entries) = self.group_entries(split);
        if groups.is_empty() {
            return split.clone();
        }
        if let Some(default_entries) = groups.remove(default) {
            entries.extend(default_entries.iter().map(|entry| self.output_path(entry)));
        }
        let config = union_assets(
            self.config_for(split, None),
            self.config_for(split, Some(default)).as_ref(),
        );
        split.clone().with_entries(entries).with_assets_config(config)
    }
}

impl AssetsDimensionSplitter<String> {
    pub fn language() -> Self {
        AssetsDimensionSplitter::new(
            |targeting| targeting.language.clone(),
            |language| ApkTargeting::default().with_language(language),
            "lang",
        )
    }
}

impl AssetsDimensionSplitter<TextureCompressionFormat> {
    pub fn texture_compression_format(stripping: &SuffixStripping) -> Self {
        let splitter = AssetsDimensionSplitter::new(
            |targeting| targeting.texture_compression_format,
            |format| ApkTargeting::default().with_texture_compression_format(format),
            "tcf",
        );
        if !stripping.enabled {
            return splitter;
        }
        let default_value = stripping.default_suffix.as_deref().and_then(|token| {
            let format = TextureCompressionFormat::from_token(token);
            if format.is_none() {
                warn!("Ignoring unknown default texture compression format '{}'.", token);
            }
            format
        });
        splitter.with_suffix_stripping(default_value)
    }
}

impl AssetsDimensionSplitter<u32> {
    pub fn device_tier(stripping: &SuffixStripping) -> Self {
        let splitter = AssetsDimensionSplitter::new(
            |targeting| targeting.device_tier,
            |tier| ApkTargeting::default().with_device_tier(tier),
            "tier",
        )
        .with_always_present(0);
        if !stripping.enabled {
            return splitter;
        }
        let default_value = stripping
            .default_suffix
            .as_deref()
            .and_then(|tier| tier.parse::<u32>().ok());
        splitter.with_suffix_stripping(default_value)
    }
}

impl<T: Ord + Clone + Debug> ModuleSplitSplitter for AssetsDimensionSplitter<T> {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        let (mut groups, unclaimed) = self.group_entries(split);
        if groups.is_empty() {
            return Ok(vec![split.clone()]);
        }
        if let Some(value) = &self.always_present {
            groups.entry(value.clone()).or_default();
        }

        let observed: Vec<T> = groups.keys().cloned().collect();
        let mut splits = Vec::new();
        if split.is_master || !unclaimed.is_empty() {
            splits.push(
                split
                    .clone()
                    .with_entries(unclaimed)
                    .with_assets_config(self.config_for(split, None)),
            );
        }
        for (value, entries) in groups {
            let config = self.config_for(split, Some(&value));
            let targeting = split.apk_targeting.merge(&(self.build_targeting)(
                Targeting::with_alternatives(value, observed.iter().cloned()),
            ))?;
            splits.push(
                split
                    .clone()
                    .with_entries(entries.iter().map(|entry| self.output_path(entry)).collect())
                    .with_assets_config(config)
                    .with_apk_targeting(targeting)
                    .with_master(false),
            );
        }
        debug!(
            "Assets of '{}' split by '{}' into {} values.",
            split.module_name,
            self.suffix_key,
            observed.len()
        );
        Ok(require_splits_when_fanned_out(splits, observed.len()))
    }
}
