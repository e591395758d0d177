use crate::error::BundleResult;
use crate::model::split::ModuleSplit;
use crate::resources::table::{Entry, ResourceTable, ResourceType, MIPMAP_TYPE};
use crate::splitters::language::master_part;
use crate::splitters::{require_splits_when_fanned_out, ModuleSplitSplitter};
use crate::targeting::{ApkTargeting, ScreenDensity, Targeting};
use std::collections::BTreeSet;

/// Distributes density-qualified resources over the standard density buckets.
///
/// Each bucket receives, for every entry, the value whose density matches best: the exact
/// density, else the closest higher one, else the closest lower one. Density-independent
/// values and launcher icons (`mipmap`) stay in the master part.
pub struct ScreenDensityResourcesSplitter;

fn is_split_by_density(resource_type: &ResourceType, density: u32) -> bool {
    resource_type.name != MIPMAP_TYPE
        && crate::resources::table::Configuration::with_density(density).is_density_specific()
}

/// Density of `entry` best serving a device of `bucket` dpi.
fn best_match(entry: &Entry, resource_type: &ResourceType, bucket: u32) -> Option<u32> {
    let densities: BTreeSet<u32> = entry
        .config_values
        .iter()
        .map(|value| value.config.density)
        .filter(|density| is_split_by_density(resource_type, *density))
        .collect();
    if densities.contains(&bucket) {
        return Some(bucket);
    }
    densities
        .range(bucket..)
        .next()
        .or_else(|| densities.range(..bucket).next_back())
        .copied()
}

impl ModuleSplitSplitter for ScreenDensityResourcesSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        let Some(table) = &split.resource_table else {
            return Ok(vec![split.clone()]);
        };
        let has_density_values = table
            .config_values()
            .any(|(resource_type, _, value)| is_split_by_density(resource_type, value.config.density));
        if !has_density_values {
            return Ok(vec![split.clone()]);
        }

        let master_table = table.filter_values(|resource_type, _, value| {
            !is_split_by_density(resource_type, value.config.density)
        });
        let bucket_tables: Vec<(ScreenDensity, ResourceTable)> = ScreenDensity::BUCKETS
            .iter()
            .map(|bucket| {
                let table = table.filter_values(|resource_type, entry, value| {
                    is_split_by_density(resource_type, value.config.density)
                        && best_match(entry, resource_type, bucket.dpi()) == Some(value.config.density)
                });
                (*bucket, table)
            })
            .filter(|(_, table)| !table.is_empty())
            .collect();

        let mut splits = vec![master_part(split, &master_table, &bucket_tables)];
        let observed: Vec<ScreenDensity> = bucket_tables.iter().map(|(bucket, _)| *bucket).collect();
        for (bucket, table) in bucket_tables {
            let files = table.referenced_files();
            let targeting = split.apk_targeting.merge(&ApkTargeting::default().with_screen_density(
                Targeting::with_alternatives(bucket, observed.iter().copied()),
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
        Ok(require_splits_when_fanned_out(splits, observed.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::manifest::AndroidManifest;
    use crate::model::module::BundleModule;
    use crate::resources::table::{Configuration, Item, Package, Value, DENSITY_ANY};
    use crate::targeting::VariantTargeting;

    fn file(path: &str) -> Value {
        Value::item(Item::File(path.to_string()))
    }

    fn module() -> BundleModule {
        let icon = Entry::new(0, "icon")
            .with_value(Configuration::with_density(160), file("res/drawable-mdpi/icon.png"))
            .with_value(Configuration::with_density(480), file("res/drawable-xxhdpi/icon.png"))
            .with_value(Configuration::with_density(DENSITY_ANY), file("res/drawable-anydpi/icon.xml"));
        let launcher = Entry::new(0, "launcher")
            .with_value(Configuration::with_density(160), file("res/mipmap-mdpi/launcher.png"));
        let table = ResourceTable::default().with_package(
            Package::new(0x7f, "com.example")
                .with_type(ResourceType::new(1, "drawable").with_entry(icon))
                .with_type(ResourceType::new(2, MIPMAP_TYPE).with_entry(launcher)),
        );
        BundleModule::new("base", AndroidManifest::for_package("com.example"))
            .with_entry("res/drawable-mdpi/icon.png", vec![1])
            .with_entry("res/drawable-xxhdpi/icon.png", vec![2])
            .with_entry("res/drawable-anydpi/icon.xml", vec![3])
            .with_entry("res/mipmap-mdpi/launcher.png", vec![4])
            .with_resource_table(table)
    }

    fn bucket<'a>(splits: &'a [ModuleSplit], density: ScreenDensity) -> &'a ModuleSplit {
        splits
            .iter()
            .find(|split| {
                split.apk_targeting.screen_density.as_ref().and_then(|d| d.single_value())
                    == Some(&density)
            })
            .unwrap()
    }

    #[test]
    fn buckets_pick_exact_then_higher_then_lower() {
        let split = ModuleSplit::for_resources(&module(), &VariantTargeting::l_plus());
        let splits = ScreenDensityResourcesSplitter.split(&split).unwrap();
        assert_eq!(splits.len(), 1 + ScreenDensity::BUCKETS.len());

        let paths = |split: &ModuleSplit| -> Vec<String> {
            split.entries.iter().map(|entry| entry.path.clone()).collect()
        };
        assert_eq!(paths(bucket(&splits, ScreenDensity::LDPI)), vec!["res/drawable-mdpi/icon.png"]);
        assert_eq!(paths(bucket(&splits, ScreenDensity::HDPI)), vec!["res/drawable-xxhdpi/icon.png"]);
        assert_eq!(
            paths(bucket(&splits, ScreenDensity::XXXHDPI)),
            vec!["res/drawable-xxhdpi/icon.png"]
        );

        let master = &splits[0];
        assert!(master.is_master);
        assert_eq!(
            paths(master),
            vec!["res/drawable-anydpi/icon.xml", "res/mipmap-mdpi/launcher.png"]
        );
    }

    #[test]
    fn density_independent_table_is_identity() {
        let table = ResourceTable::default().with_package(
            Package::new(0x7f, "com.example").with_type(
                ResourceType::new(1, "drawable")
                    .with_entry(Entry::new(0, "x").with_value(Configuration::default(), file("res/drawable/x.xml"))),
            ),
        );
        let module = BundleModule::new("base", AndroidManifest::for_package("com.example"))
            .with_resource_table(table);
        let split = ModuleSplit::for_resources(&module, &VariantTargeting::l_plus());
        assert_eq!(ScreenDensityResourcesSplitter.split(&split).unwrap(), vec![split]);
    }
}
