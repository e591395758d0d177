use crate::error::BundleResult;
use crate::model::split::ModuleSplit;
use crate::splitters::ModuleSplitSplitter;
use crate::targeting::{ApkTargeting, Sanitizer, Targeting};
use std::collections::BTreeMap;

/// Moves sanitizer builds of native libraries (`lib/<abi>-hwasan`) out of the ABI split.
pub struct SanitizerNativeLibrariesSplitter;

impl ModuleSplitSplitter for SanitizerNativeLibrariesSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        let Some(config) = &split.native_config else {
            return Ok(vec![split.clone()]);
        };
        let sanitizer_of_directory: BTreeMap<&str, Sanitizer> = config
            .directories
            .iter()
            .filter_map(|dir| Some((dir.path.as_str(), dir.targeting.sanitizer?)))
            .collect();

        let mut by_sanitizer: BTreeMap<Sanitizer, Vec<_>> = BTreeMap::new();
        let mut remaining = Vec::new();
        for entry in &split.entries {
            match sanitizer_of_directory.get(entry.directory()) {
                Some(sanitizer) => by_sanitizer.entry(*sanitizer).or_default().push(entry.clone()),
                None => remaining.push(entry.clone()),
            }
        }
        if by_sanitizer.is_empty() {
            return Ok(vec![split.clone()]);
        }

        let mut splits = Vec::new();
        if split.is_master || !remaining.is_empty() {
            splits.push(split.clone().with_entries(remaining));
        }
        for (sanitizer, entries) in by_sanitizer {
            let targeting = split
                .apk_targeting
                .merge(&ApkTargeting::default().with_sanitizer(Targeting::value(sanitizer)))?;
            splits.push(
                split
                    .clone()
                    .with_entries(entries)
                    .with_apk_targeting(targeting)
                    .with_master(false),
            );
        }
        Ok(splits)
    }
}
