//! Fuses the splits of several modules into a single APK.

use crate::android::manifest::AndroidManifest;
use crate::android::manifest_merger::{merge_manifests, MergeMode, BASE_MODULE_NAME};
use crate::android::mutator::push_unique;
use crate::error::BundleResult;
use crate::model::entry::ModuleEntry;
use crate::model::module::DEX_DIRECTORY;
use crate::model::split::{ModuleSplit, SplitType};
use crate::resources::merger::merge_all;
use crate::splitters::same_targeting::append_entries;
use crate::targeting::directories::Assets;
use log::debug;
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::{eof, map_res, opt};
use nom::IResult;
use std::collections::BTreeMap;

/// `classes.dex` is 1, `classes<N>.dex` is N.
fn dex_index(input: &str) -> IResult<&str, u32> {
    let (input, _) = tag("classes")(input)?;
    let (input, index) = opt(map_res(digit1, str::parse::<u32>))(input)?;
    let (input, _) = tag(".dex")(input)?;
    let (input, _) = eof(input)?;
    Ok((input, index.unwrap_or(1)))
}

fn dex_file_name(index: usize) -> String {
    if index == 1 {
        format!("{DEX_DIRECTORY}/classes.dex")
    } else {
        format!("{DEX_DIRECTORY}/classes{index}.dex")
    }
}

/// Base module first, the others by name.
fn module_order(name: &str) -> (bool, &str) {
    (name != BASE_MODULE_NAME, name)
}

/// Union of the assets directories of all splits, so the fused shard can still be split by
/// assets dimensions.
fn merge_assets_configs(splits: &[&ModuleSplit]) -> Option<Assets> {
    let merged = splits
        .iter()
        .filter_map(|split| split.assets_config.as_ref())
        .fold(Assets::default(), Assets::union);
    (!merged.directories.is_empty()).then_some(merged)
}

pub struct ModuleSplitsToShardMerger {
    merge_mode: MergeMode,
}

impl ModuleSplitsToShardMerger {
    pub fn new(merge_mode: MergeMode) -> Self {
        ModuleSplitsToShardMerger { merge_mode }
    }

    /// Merges the splits of one shard into a master split of the base module.
    ///
    /// The result carries the variant of the first split and no APK targeting; callers
    /// set the shard's targeting themselves.
    pub fn merge(&self, splits: &[ModuleSplit], split_type: SplitType) -> BundleResult<ModuleSplit> {
        let Some(first) = splits.first() else {
            fail!("Cannot merge an empty shard.");
        };
        let mut ordered: Vec<&ModuleSplit> = splits.iter().collect();
        ordered.sort_by(|a, b| module_order(&a.module_name).cmp(&module_order(&b.module_name)));

        let mut entries = Vec::new();
        let mut dex_files: Vec<(&str, u32, &ModuleEntry)> = Vec::new();
        let mut manifests: BTreeMap<String, Vec<AndroidManifest>> = BTreeMap::new();
        let mut mutators = Vec::new();
        for split in &ordered {
            for entry in &split.entries {
                let index = entry
                    .is_under(DEX_DIRECTORY)
                    .then(|| dex_index(entry.file_name()).ok())
                    .flatten();
                match index {
                    Some((_, index)) => dex_files.push((split.module_name.as_str(), index, entry)),
                    None => append_entries(&mut entries, vec![entry.clone()])?,
                }
            }
            manifests
                .entry(split.module_name.clone())
                .or_insert_with(|| vec![split.manifest.clone()]);
            for mutator in &split.manifest_mutators {
                push_unique(&mut mutators, mutator.clone());
            }
        }

        // Dex files of one module may arrive through several splits.
        dex_files.sort_by(|a, b| (module_order(a.0), a.1).cmp(&(module_order(b.0), b.1)));
        dex_files.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);
        let renumbered = dex_files.iter().enumerate().map(|(idx, (_, _, entry))| {
            (*entry).clone().with_path(dex_file_name(idx + 1))
        });
        entries.extend(renumbered);

        let manifest = merge_manifests(&manifests, self.merge_mode)?;
        let resource_table = merge_all(ordered.iter().filter_map(|split| split.resource_table.as_ref()))?;
        let assets_config = merge_assets_configs(&ordered);
        debug!(
            "Fused {} splits of {} modules into one shard with {} dex files.",
            splits.len(),
            manifests.len(),
            dex_files.len()
        );

        Ok(ModuleSplit {
            module_name: BASE_MODULE_NAME.to_string(),
            entries,
            manifest,
            manifest_mutators: mutators,
            master_manifest_mutators: Vec::new(),
            apk_targeting: Default::default(),
            variant_targeting: first.variant_targeting.clone(),
            split_type,
            is_master: true,
            resource_table,
            native_config: None,
            assets_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::module::BundleModule;
    use crate::resources::table::{Configuration, Entry, Item, Package, ResourceTable, ResourceType, Value};
    use crate::targeting::VariantTargeting;

    fn split(name: &str, entries: &[(&str, u8)]) -> ModuleSplit {
        let mut module = BundleModule::new(name, AndroidManifest::for_package("com.example"));
        for (path, content) in entries {
            module = module.with_entry(*path, vec![*content]);
        }
        ModuleSplit::for_module(&module, &VariantTargeting::sdk(1))
    }

    #[test]
    fn dex_names_parse() {
        assert_eq!(dex_index("classes.dex").unwrap().1, 1);
        assert_eq!(dex_index("classes12.dex").unwrap().1, 12);
        assert!(dex_index("classes.dex.bak").is_err());
    }

    #[test]
    fn dex_files_are_renumbered_base_first() {
        let splits = vec![
            split("feature", &[("dex/classes.dex", 3)]),
            split("base", &[("dex/classes2.dex", 2), ("dex/classes.dex", 1)]),
        ];
        let shard = ModuleSplitsToShardMerger::new(MergeMode::Replace)
            .merge(&splits, SplitType::Standalone)
            .unwrap();
        let dex: Vec<_> = shard
            .entries_under(DEX_DIRECTORY)
            .map(|entry| (entry.path.as_str(), entry.content[0]))
            .collect();
        assert_eq!(
            dex,
            vec![("dex/classes.dex", 1), ("dex/classes2.dex", 2), ("dex/classes3.dex", 3)]
        );
        assert!(shard.is_master);
        assert_eq!(shard.module_name, "base");
    }

    #[test]
    fn same_path_different_content_is_fatal() {
        let splits = vec![
            split("base", &[("assets/a.txt", 1)]),
            split("feature", &[("assets/a.txt", 2)]),
        ];
        let err = ModuleSplitsToShardMerger::new(MergeMode::Replace)
            .merge(&splits, SplitType::Standalone)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Existing module entry 'assets/a.txt' with different contents."
        );
    }

    #[test]
    fn resource_tables_are_merged() {
        let table = |id: u32, name: &str| {
            ResourceTable::default().with_package(Package::new(0x7f, "com.example").with_type(
                ResourceType::new(1, "string").with_entry(Entry::new(id, name).with_value(
                    Configuration::default(),
                    Value::item(Item::String(name.to_string())),
                )),
            ))
        };
        let base = split("base", &[]).with_resource_table(Some(table(0, "app_name")));
        let feature = split("feature", &[]).with_resource_table(Some(table(1, "title")));
        let shard = ModuleSplitsToShardMerger::new(MergeMode::Replace)
            .merge(&[base, feature], SplitType::Standalone)
            .unwrap();
        assert_eq!(shard.resource_table.unwrap().config_values().count(), 2);
    }
}
