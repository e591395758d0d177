use crate::android::mutator::push_unique;
use crate::error::BundleResult;
use crate::model::entry::ModuleEntry;
use crate::model::split::ModuleSplit;
use crate::resources::merger::merge_all;
use crate::targeting::directories::union_assets;
use crate::targeting::{ApkTargeting, VariantTargeting};
use std::collections::BTreeMap;

/// Collapses splits of one module that ended up with identical targeting.
pub struct SameTargetingMerger;

impl SameTargetingMerger {
    pub fn merge(&self, splits: Vec<ModuleSplit>) -> BundleResult<Vec<ModuleSplit>> {
        let mut groups: BTreeMap<(VariantTargeting, ApkTargeting), Vec<ModuleSplit>> = BTreeMap::new();
        for split in splits {
            groups
                .entry((split.variant_targeting.clone(), split.apk_targeting.clone()))
                .or_default()
                .push(split);
        }
        let mut merged = groups
            .into_values()
            .map(merge_group)
            .collect::<BundleResult<Vec<_>>>()?;
        merged.sort_by(|a, b| {
            (!a.is_master, &a.variant_targeting, &a.apk_targeting).cmp(&(
                !b.is_master,
                &b.variant_targeting,
                &b.apk_targeting,
            ))
        });
        Ok(merged)
    }
}

pub(crate) fn append_entries(target: &mut Vec<ModuleEntry>, entries: Vec<ModuleEntry>) -> BundleResult<()> {
    for entry in entries {
        match target.iter().find(|existing| existing.path == entry.path) {
            Some(existing) if existing.content != entry.content => {
                fail!("Existing module entry '{}' with different contents.", entry.path);
            }
            Some(_) => {}
            None => target.push(entry),
        }
    }
    Ok(())
}

fn merge_group(group: Vec<ModuleSplit>) -> BundleResult<ModuleSplit> {
    let mut splits = group.into_iter();
    let Some(mut merged) = splits.next() else {
        fail!("Cannot merge an empty group of splits.");
    };
    let rest: Vec<ModuleSplit> = splits.collect();
    if rest.is_empty() {
        return Ok(merged);
    }
    let tables = merge_all(
        std::iter::once(&merged)
            .chain(rest.iter())
            .filter_map(|split| split.resource_table.as_ref()),
    )?;
    for split in rest {
        append_entries(&mut merged.entries, split.entries)?;
        for mutator in split.manifest_mutators {
            push_unique(&mut merged.manifest_mutators, mutator);
        }
        for mutator in split.master_manifest_mutators {
            push_unique(&mut merged.master_manifest_mutators, mutator);
        }
        merged.is_master |= split.is_master;
        merged.native_config = merged.native_config.or(split.native_config);
        merged.assets_config = union_assets(merged.assets_config, split.assets_config.as_ref());
    }
    merged.resource_table = tables;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::manifest::AndroidManifest;
    use crate::model::module::BundleModule;
    use crate::targeting::{Abi, Targeting};

    fn module() -> BundleModule {
        BundleModule::new("base", AndroidManifest::for_package("com.example"))
            .with_entry("dex/classes.dex", vec![1])
            .with_entry("assets/a.txt", vec![2])
            .with_entry("lib/x86/libfoo.so", vec![3])
    }

    #[test]
    fn master_parts_collapse_into_one_split() {
        let module = module();
        let variant = VariantTargeting::l_plus();
        let splits = vec![
            ModuleSplit::for_native_libraries(&module, &variant)
                .with_apk_targeting(ApkTargeting::default().with_abi(Targeting::value(Abi::X86))),
            ModuleSplit::for_dex(&module, &variant),
            ModuleSplit::for_assets(&module, &variant),
        ];
        let merged = SameTargetingMerger.merge(splits).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged[0].is_master);
        assert_eq!(merged[0].entries.len(), 2);
        assert!(!merged[1].is_master);
    }

    #[test]
    fn conflicting_contents_are_rejected() {
        let mut entries = vec![ModuleEntry::new("a", vec![1])];
        assert!(append_entries(&mut entries, vec![ModuleEntry::new("a", vec![1])]).is_ok());
        let err = append_entries(&mut entries, vec![ModuleEntry::new("a", vec![2])]).unwrap_err();
        assert_eq!(err.to_string(), "Existing module entry 'a' with different contents.");
    }
}
