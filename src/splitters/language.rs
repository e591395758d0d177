use crate::error::BundleResult;
use crate::model::entry::ModuleEntry;
use crate::model::split::ModuleSplit;
use crate::resources::table::ResourceTable;
use crate::splitters::{require_splits_when_fanned_out, ModuleSplitSplitter};
use crate::targeting::{ApkTargeting, Targeting};
use std::collections::BTreeSet;

/// Moves locale-qualified resource values into one config split per language.
pub struct LanguageResourcesSplitter;

impl ModuleSplitSplitter for LanguageResourcesSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        let Some(table) = &split.resource_table else {
            return Ok(vec![split.clone()]);
        };
        let languages: BTreeSet<String> = table
            .config_values()
            .filter_map(|(_, _, value)| value.config.language())
            .collect();
        if languages.is_empty() {
            return Ok(vec![split.clone()]);
        }

        let master_table = table.filter_values(|_, _, value| value.config.language().is_none());
        let language_tables: Vec<(String, ResourceTable)> = languages
            .iter()
            .map(|language| {
                let table = table.filter_values(|_, _, value| {
                    value.config.language().as_deref() == Some(language.as_str())
                });
                (language.clone(), table)
            })
            .collect();
        let mut splits = vec![master_part(split, &master_table, &language_tables)];
        for (language, table) in language_tables {
            let files = table.referenced_files();
            let targeting = split.apk_targeting.merge(&ApkTargeting::default().with_language(
                Targeting::with_alternatives(language, languages.iter().cloned()),
            ))?;
            let entries = split
                .entries
                .iter()
                .filter(|entry| files.contains(&entry.path))
                .cloned()
                .collect();
            splits.push(
                split
                    .clone()
                    .with_entries(entries)
                    .with_resource_table(Some(table))
                    .with_apk_targeting(targeting)
                    .with_master(false),
            );
        }
        Ok(require_splits_when_fanned_out(splits, languages.len()))
    }
}

/// The input with config values of every split-out table removed; files referenced only by
/// moved values leave with them.
pub(crate) fn master_part<K>(
    split: &ModuleSplit,
    master_table: &ResourceTable,
    moved: &[(K, ResourceTable)],
) -> ModuleSplit {
    let kept_files = master_table.referenced_files();
    let moved_files: BTreeSet<String> = moved
        .iter()
        .flat_map(|(_, table)| table.referenced_files())
        .collect();
    let entries: Vec<ModuleEntry> = split
        .entries
        .iter()
        .filter(|entry| kept_files.contains(&entry.path) || !moved_files.contains(&entry.path))
        .cloned()
        .collect();
    let table = (!master_table.is_empty()).then(|| master_table.clone());
    split.clone().with_entries(entries).with_resource_table(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::manifest::AndroidManifest;
    use crate::model::module::BundleModule;
    use crate::resources::table::{Configuration, Entry, Item, Package, ResourceType, Value};
    use crate::targeting::VariantTargeting;

    fn strings(values: &[(&str, &str)]) -> ResourceTable {
        let mut entry = Entry::new(0, "title");
        for (locale, text) in values {
            entry = entry.with_value(
                Configuration::with_locale(*locale),
                Value::item(Item::String(text.to_string())),
            );
        }
        ResourceTable::default().with_package(
            Package::new(0x7f, "com.example")
                .with_type(ResourceType::new(1, "string").with_entry(entry)),
        )
    }

    fn resources_split(table: ResourceTable) -> ModuleSplit {
        let module = BundleModule::new("base", AndroidManifest::for_package("com.example"))
            .with_resource_table(table);
        ModuleSplit::for_resources(&module, &VariantTargeting::l_plus())
    }

    #[test]
    fn one_split_per_language_and_default_stays_master() {
        let split = resources_split(strings(&[
            ("", "Title"),
            ("fr", "Titre"),
            ("fr-CA", "Titre"),
            ("de", "Titel"),
        ]));
        let splits = LanguageResourcesSplitter.split(&split).unwrap();
        assert_eq!(splits.len(), 3);
        assert!(splits[0].is_master);
        let master_values = splits[0].resource_table.as_ref().unwrap().config_values().count();
        assert_eq!(master_values, 1);
        let french = &splits[2];
        assert_eq!(
            french.apk_targeting.language,
            Some(Targeting::with_alternatives("fr".to_string(), ["de".to_string()]))
        );
        assert_eq!(french.resource_table.as_ref().unwrap().config_values().count(), 2);
        assert!(!french.is_master);
    }

    #[test]
    fn unqualified_table_is_identity() {
        let split = resources_split(strings(&[("", "Title")]));
        assert_eq!(LanguageResourcesSplitter.split(&split).unwrap(), vec![split]);
    }
}
