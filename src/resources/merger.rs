//! Merging of resource tables when several modules are fused into one shard.

use crate::error::{BundleError, BundleResult};
use crate::resources::table::{
    CompoundValue, ConfigValue, Entry, Overlayable, Package, ResourceTable, ResourceType, Value,
    ValueKind,
};
use log::debug;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Clears every source reference reachable from a value, at any depth.
pub trait StripSources {
    fn strip_sources(&mut self);
}

impl StripSources for CompoundValue {
    fn strip_sources(&mut self) {
        match self {
            CompoundValue::Attribute { symbols } => {
                symbols.iter_mut().for_each(|symbol| symbol.source = None)
            }
            CompoundValue::Style {
                parent_source,
                entries,
                ..
            } => {
                *parent_source = None;
                entries.iter_mut().for_each(|entry| entry.source = None);
            }
            CompoundValue::Array { elements } => {
                elements.iter_mut().for_each(|element| element.source = None)
            }
            CompoundValue::Plural { entries } => {
                entries.iter_mut().for_each(|entry| entry.source = None)
            }
            CompoundValue::Styleable { entries } => {
                entries.iter_mut().for_each(|entry| entry.source = None)
            }
        }
    }
}

impl StripSources for Value {
    fn strip_sources(&mut self) {
        self.source = None;
        if let ValueKind::Compound(compound) = &mut self.kind {
            compound.strip_sources();
        }
    }
}

impl StripSources for Entry {
    fn strip_sources(&mut self) {
        if let Some(visibility) = &mut self.visibility {
            visibility.source = None;
        }
        if let Some(allow_new) = &mut self.allow_new {
            allow_new.source = None;
        }
        if let Some(item) = &mut self.overlayable_item {
            item.source = None;
        }
        for config_value in &mut self.config_values {
            config_value.value.strip_sources();
        }
    }
}

impl<T: StripSources> StripSources for Option<T> {
    fn strip_sources(&mut self) {
        if let Some(inner) = self {
            inner.strip_sources();
        }
    }
}

impl StripSources for crate::resources::table::Visibility {
    fn strip_sources(&mut self) {
        self.source = None;
    }
}

impl StripSources for crate::resources::table::AllowNew {
    fn strip_sources(&mut self) {
        self.source = None;
    }
}

impl StripSources for crate::resources::table::OverlayableItem {
    fn strip_sources(&mut self) {
        self.source = None;
    }
}

impl StripSources for ResourceTable {
    fn strip_sources(&mut self) {
        for overlayable in &mut self.overlayables {
            overlayable.source = None;
        }
        for package in &mut self.packages {
            for resource_type in &mut package.types {
                for entry in &mut resource_type.entries {
                    entry.strip_sources();
                }
            }
        }
    }
}

/// Merges two tables.
///
/// Packages, types and entries with the same id are merged and must agree on their
/// name; anything else is concatenated. When the source pools differ, the first pool is
/// kept and every source of the second table is dropped.
pub fn merge(first: &ResourceTable, second: &ResourceTable) -> BundleResult<ResourceTable> {
    let mut first = first.clone();
    let mut second = second.clone();
    if first.source_pool != second.source_pool {
        debug!("Source pools differ, stripping source references of the merged table.");
        second.strip_sources();
    }

    let overlayables = merge_overlayables(&first.overlayables, &second.overlayables)?;
    reindex_overlayables(&mut first, &overlayables)?;
    reindex_overlayables(&mut second, &overlayables)?;

    Ok(ResourceTable {
        source_pool: first.source_pool,
        packages: merge_by_id(first.packages, second.packages, |p| p.id, merge_packages)?,
        overlayables,
    })
}

/// Folds any number of tables left to right, `None` when there is nothing to merge.
pub fn merge_all<'a>(
    tables: impl IntoIterator<Item = &'a ResourceTable>,
) -> BundleResult<Option<ResourceTable>> {
    let mut merged: Option<ResourceTable> = None;
    for table in tables {
        merged = Some(match merged {
            Some(acc) => merge(&acc, table)?,
            None => table.clone(),
        });
    }
    Ok(merged)
}

fn merge_overlayables(
    first: &[Overlayable],
    second: &[Overlayable],
) -> BundleResult<Vec<Overlayable>> {
    let mut by_name: BTreeMap<&str, &Overlayable> = BTreeMap::new();
    for overlayable in first.iter().chain(second) {
        match by_name.get(overlayable.name.as_str()) {
            Some(existing) if existing.actor != overlayable.actor => {
                return Err(BundleError::OverlayableConflict {
                    name: overlayable.name.clone(),
                    first: existing.actor.clone(),
                    second: overlayable.actor.clone(),
                });
            }
            Some(_) => {}
            None => {
                by_name.insert(&overlayable.name, overlayable);
            }
        }
    }
    Ok(by_name.into_values().cloned().collect())
}

/// Points every overlayable item of `table` at its position in `merged`.
fn reindex_overlayables(table: &mut ResourceTable, merged: &[Overlayable]) -> BundleResult<()> {
    let remap: Vec<u32> = table
        .overlayables
        .iter()
        .map(|overlayable| {
            merged
                .iter()
                .position(|candidate| candidate.name == overlayable.name)
                .and_then(|idx| u32::try_from(idx).ok())
                .unwrap_or_default()
        })
        .collect();
    for package in &mut table.packages {
        for resource_type in &mut package.types {
            for entry in &mut resource_type.entries {
                let Some(item) = &mut entry.overlayable_item else {
                    continue;
                };
                item.overlayable_idx = match remap.get(item.overlayable_idx as usize) {
                    Some(idx) => *idx,
                    None => fail!(
                        "Entry '{}' references overlayable #{} but the table declares {}.",
                        entry.name,
                        item.overlayable_idx,
                        remap.len()
                    ),
                };
            }
        }
    }
    Ok(())
}

fn merge_by_id<T>(
    first: Vec<T>,
    second: Vec<T>,
    id: impl Fn(&T) -> u32,
    merge_one: impl Fn(T, T) -> BundleResult<T>,
) -> BundleResult<Vec<T>> {
    let mut merged = first;
    for other in second {
        match merged.iter().position(|existing| id(existing) == id(&other)) {
            Some(idx) => {
                let existing = merged.remove(idx);
                merged.insert(idx, merge_one(existing, other)?);
            }
            None => merged.push(other),
        }
    }
    Ok(merged)
}

fn check_same_name(location: String, first: &str, second: &str) -> BundleResult<()> {
    if first != second {
        return Err(BundleError::ResourceTableConflict {
            field: "name",
            location,
            first: first.to_string(),
            second: second.to_string(),
        });
    }
    Ok(())
}

fn merge_packages(first: Package, second: Package) -> BundleResult<Package> {
    check_same_name(format!("package 0x{:02x}", first.id), &first.name, &second.name)?;
    let package_id = first.id;
    let types = merge_by_id(first.types, second.types, |t| t.id, |a, b| {
        merge_types(package_id, a, b)
    })?;
    Ok(Package { types, ..first })
}

fn merge_types(package_id: u32, first: ResourceType, second: ResourceType) -> BundleResult<ResourceType> {
    check_same_name(
        format!("type 0x{:02x}{:02x}", package_id, first.id),
        &first.name,
        &second.name,
    )?;
    let type_prefix = (package_id << 24) | (first.id << 16);
    let entries = merge_by_id(first.entries, second.entries, |e| e.id, |a, b| {
        merge_entries(type_prefix, a, b)
    })?;
    Ok(ResourceType { entries, ..first })
}

fn merge_entries(type_prefix: u32, first: Entry, second: Entry) -> BundleResult<Entry> {
    let location = format!("resource 0x{:08x}", type_prefix | first.id);
    check_same_name(location.clone(), &first.name, &second.name)?;
    let visibility = merge_singleton("visibility", &location, first.visibility, second.visibility)?;
    let allow_new = merge_singleton("allow_new", &location, first.allow_new, second.allow_new)?;
    let overlayable_item = merge_singleton(
        "overlayable_item",
        &location,
        first.overlayable_item,
        second.overlayable_item,
    )?;
    let mut config_values: Vec<ConfigValue> = first.config_values;
    for value in second.config_values {
        if !config_values.contains(&value) {
            config_values.push(value);
        }
    }
    Ok(Entry {
        id: first.id,
        name: first.name,
        visibility,
        allow_new,
        overlayable_item,
        config_values,
    })
}

/// Either side may be absent; when both are present they must agree, sources aside.
fn merge_singleton<T: Clone + PartialEq + Debug + StripSources>(
    field: &'static str,
    location: &str,
    first: Option<T>,
    second: Option<T>,
) -> BundleResult<Option<T>> {
    match (first, second) {
        (Some(a), Some(b)) => {
            let (mut bare_a, mut bare_b) = (a.clone(), b.clone());
            bare_a.strip_sources();
            bare_b.strip_sources();
            if bare_a != bare_b {
                return Err(BundleError::ResourceTableConflict {
                    field,
                    location: location.to_string(),
                    first: format!("{a:?}"),
                    second: format!("{b:?}"),
                });
            }
            Ok(Some(a))
        }
        (a, b) => Ok(a.or(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::table::{
        Configuration, Item, OverlayableItem, Source, StyleEntry, Visibility, VisibilityLevel,
    };

    fn string_entry(id: u32, name: &str, locale: &str, text: &str) -> Entry {
        Entry::new(id, name).with_value(
            Configuration::with_locale(locale),
            Value::item(Item::String(text.into())),
        )
    }

    fn table(entries: Vec<Entry>) -> ResourceTable {
        let mut string_type = ResourceType::new(2, "string");
        string_type.entries = entries;
        ResourceTable::default().with_package(Package::new(0x7f, "com.example").with_type(string_type))
    }

    #[test]
    fn matching_entries_union_config_values() {
        let a = table(vec![string_entry(0, "title", "", "Title")]);
        let b = table(vec![
            string_entry(0, "title", "", "Title"),
            string_entry(1, "subtitle", "", "Sub"),
        ]);
        let b = {
            let mut b = b;
            b.packages[0].types[0].entries[0]
                .config_values
                .push(ConfigValue::new(
                    Configuration::with_locale("fr"),
                    Value::item(Item::String("Titre".into())),
                ));
            b
        };
        let merged = merge(&a, &b).unwrap();
        let entries = &merged.packages[0].types[0].entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].config_values.len(), 2);
    }

    #[test]
    fn mismatched_entry_name_names_the_field() {
        let a = table(vec![string_entry(0, "title", "", "A")]);
        let b = table(vec![string_entry(0, "heading", "", "A")]);
        let err = merge(&a, &b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected same values of field 'name' for resource 0x7f020000, but got 'title' and 'heading'."
        );
    }

    #[test]
    fn conflicting_visibility_is_fatal() {
        let mut a = string_entry(0, "title", "", "A");
        a.visibility = Some(Visibility {
            level: VisibilityLevel::Public,
            source: None,
            comment: String::new(),
        });
        let mut b = a.clone();
        b.visibility = Some(Visibility {
            level: VisibilityLevel::Private,
            source: None,
            comment: String::new(),
        });
        let err = merge(&table(vec![a]), &table(vec![b])).unwrap_err();
        assert!(matches!(err, BundleError::ResourceTableConflict { field: "visibility", .. }));
    }

    #[test]
    fn different_pools_strip_nested_sources_of_second_table() {
        let source = Source {
            path_idx: 3,
            position: None,
        };
        let style = Value {
            source: Some(source.clone()),
            comment: String::new(),
            kind: ValueKind::Compound(CompoundValue::Style {
                parent: None,
                parent_source: Some(source.clone()),
                entries: vec![StyleEntry {
                    source: Some(source.clone()),
                    comment: String::new(),
                    key: 0x0101_0000,
                    item: Item::Reference(0x7f01_0000),
                }],
            }),
        };
        let mut a = table(vec![]);
        a.source_pool = Some(vec![1]);
        let mut b = table(vec![Entry::new(4, "theme").with_value(Configuration::default(), style)]);
        b.source_pool = Some(vec![2]);
        let merged = merge(&a, &b).unwrap();
        assert_eq!(merged.source_pool, Some(vec![1]));
        let value = &merged.packages[0].types[0].entries[0].config_values[0].value;
        assert_eq!(value.source, None);
        match &value.kind {
            ValueKind::Compound(CompoundValue::Style {
                parent_source,
                entries,
                ..
            }) => {
                assert_eq!(*parent_source, None);
                assert_eq!(entries[0].source, None);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn equal_pools_keep_sources() {
        let source = Source {
            path_idx: 1,
            position: None,
        };
        let mut a = table(vec![]);
        a.source_pool = Some(vec![9]);
        let mut b = table(vec![Entry::new(0, "x").with_value(
            Configuration::default(),
            Value::item(Item::Id).with_source(source.clone()),
        )]);
        b.source_pool = Some(vec![9]);
        let merged = merge(&a, &b).unwrap();
        assert_eq!(
            merged.packages[0].types[0].entries[0].config_values[0].value.source,
            Some(source)
        );
    }

    fn overlayable(name: &str, actor: &str) -> Overlayable {
        Overlayable {
            name: name.into(),
            source: None,
            actor: actor.into(),
        }
    }

    fn overlayable_entry(id: u32, name: &str, idx: u32) -> Entry {
        let mut entry = string_entry(id, name, "", name);
        entry.overlayable_item = Some(OverlayableItem {
            source: None,
            comment: String::new(),
            policies: vec!["public".into()],
            overlayable_idx: idx,
        });
        entry
    }

    #[test]
    fn overlayable_indices_follow_sorted_list() {
        let mut a = table(vec![overlayable_entry(0, "a", 0)]);
        a.overlayables = vec![overlayable("zeta", "actor")];
        let mut b = table(vec![overlayable_entry(1, "b", 0)]);
        b.overlayables = vec![overlayable("alpha", "actor")];
        let merged = merge(&a, &b).unwrap();
        let names: Vec<_> = merged.overlayables.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        let idx: Vec<_> = merged.packages[0].types[0]
            .entries
            .iter()
            .map(|entry| entry.overlayable_item.as_ref().map(|item| item.overlayable_idx))
            .collect();
        assert_eq!(idx, vec![Some(1), Some(0)]);
    }

    #[test]
    fn overlayable_actor_conflict_is_fatal() {
        let mut a = table(vec![]);
        a.overlayables = vec![overlayable("shared", "overlay://one")];
        let mut b = table(vec![]);
        b.overlayables = vec![overlayable("shared", "overlay://two")];
        assert!(matches!(
            merge(&a, &b).unwrap_err(),
            BundleError::OverlayableConflict { .. }
        ));
    }

    #[test]
    fn merge_all_of_nothing_is_none() {
        assert_eq!(merge_all(std::iter::empty()).unwrap(), None);
    }
}
