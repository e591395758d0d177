//! Structured view of a compiled resource table.
//!
//! Packages, types and entries are identified by numeric ids; each entry holds one
//! value per configuration. `Source` references point into the table's source string
//! pool and therefore become meaningless once moved into a table with another pool.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MIPMAP_TYPE: &str = "mipmap";

/// Density marker for values that must never be scaled.
pub const DENSITY_NONE: u32 = 0xffff;
/// Density marker for vector resources usable at any density.
pub const DENSITY_ANY: u32 = 0xfffe;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// Location of a value in the sources the table was compiled from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub path_idx: u32,
    pub position: Option<SourcePosition>,
}

/// Device configuration qualifiers of a value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Configuration {
    /// Dots per inch, 0 when unqualified.
    pub density: u32,
    /// BCP-47-ish locale (`en`, `en-GB`, `b+sr+Latn`), empty when unqualified.
    pub locale: String,
}

impl Configuration {
    pub fn with_density(density: u32) -> Self {
        Configuration {
            density,
            ..Configuration::default()
        }
    }

    pub fn with_locale(locale: impl Into<String>) -> Self {
        Configuration {
            locale: locale.into(),
            ..Configuration::default()
        }
    }

    /// Language part of the locale, lower-cased.
    pub fn language(&self) -> Option<String> {
        if self.locale.is_empty() {
            return None;
        }
        let language = match self.locale.strip_prefix("b+") {
            Some(tag) => tag.split('+').next().unwrap_or(tag),
            None => self.locale.split(['-', '_']).next().unwrap_or(&self.locale),
        };
        Some(language.to_ascii_lowercase())
    }

    /// Whether the value is tied to a concrete density bucket.
    pub fn is_density_specific(&self) -> bool {
        self.density != 0 && self.density != DENSITY_NONE && self.density != DENSITY_ANY
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    Reference(u32),
    String(String),
    RawString(String),
    File(String),
    Id,
    Primitive(i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeSymbol {
    pub source: Option<Source>,
    pub comment: String,
    pub name: u32,
    pub value: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleEntry {
    pub source: Option<Source>,
    pub comment: String,
    pub key: u32,
    pub item: Item,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayElement {
    pub source: Option<Source>,
    pub comment: String,
    pub item: Item,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluralEntry {
    pub source: Option<Source>,
    pub comment: String,
    pub arity: String,
    pub item: Item,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleableEntry {
    pub source: Option<Source>,
    pub comment: String,
    pub attr: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompoundValue {
    Attribute {
        symbols: Vec<AttributeSymbol>,
    },
    Style {
        parent: Option<u32>,
        parent_source: Option<Source>,
        entries: Vec<StyleEntry>,
    },
    Array {
        elements: Vec<ArrayElement>,
    },
    Plural {
        entries: Vec<PluralEntry>,
    },
    Styleable {
        entries: Vec<StyleableEntry>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Item(Item),
    Compound(CompoundValue),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value {
    pub source: Option<Source>,
    pub comment: String,
    pub kind: ValueKind,
}

impl Value {
    pub fn item(item: Item) -> Self {
        Value {
            source: None,
            comment: String::new(),
            kind: ValueKind::Item(item),
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    fn items(&self) -> Vec<&Item> {
        match &self.kind {
            ValueKind::Item(item) => vec![item],
            ValueKind::Compound(CompoundValue::Style { entries, .. }) => {
                entries.iter().map(|entry| &entry.item).collect()
            }
            ValueKind::Compound(CompoundValue::Array { elements }) => {
                elements.iter().map(|element| &element.item).collect()
            }
            ValueKind::Compound(CompoundValue::Plural { entries }) => {
                entries.iter().map(|entry| &entry.item).collect()
            }
            ValueKind::Compound(_) => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigValue {
    pub config: Configuration,
    pub value: Value,
}

impl ConfigValue {
    pub fn new(config: Configuration, value: Value) -> Self {
        ConfigValue { config, value }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityLevel {
    Unknown,
    Private,
    Public,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Visibility {
    pub level: VisibilityLevel,
    pub source: Option<Source>,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowNew {
    pub source: Option<Source>,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayableItem {
    pub source: Option<Source>,
    pub comment: String,
    pub policies: Vec<String>,
    /// Index into [`ResourceTable::overlayables`].
    pub overlayable_idx: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Overlayable {
    pub name: String,
    pub source: Option<Source>,
    pub actor: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: u32,
    pub name: String,
    pub visibility: Option<Visibility>,
    pub allow_new: Option<AllowNew>,
    pub overlayable_item: Option<OverlayableItem>,
    pub config_values: Vec<ConfigValue>,
}

impl Entry {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Entry {
            id,
            name: name.into(),
            visibility: None,
            allow_new: None,
            overlayable_item: None,
            config_values: Vec::new(),
        }
    }

    pub fn with_value(mut self, config: Configuration, value: Value) -> Self {
        self.config_values.push(ConfigValue::new(config, value));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub id: u32,
    pub name: String,
    pub entries: Vec<Entry>,
}

impl ResourceType {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        ResourceType {
            id,
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: u32,
    pub name: String,
    pub types: Vec<ResourceType>,
}

impl Package {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Package {
            id,
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, resource_type: ResourceType) -> Self {
        self.types.push(resource_type);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTable {
    /// Serialized source string pool, opaque to the splitting core.
    pub source_pool: Option<Vec<u8>>,
    pub packages: Vec<Package>,
    pub overlayables: Vec<Overlayable>,
}

impl ResourceTable {
    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.push(package);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Every config value together with the names of its enclosing type.
    pub fn config_values(&self) -> impl Iterator<Item = (&ResourceType, &Entry, &ConfigValue)> {
        self.packages.iter().flat_map(|package| {
            package.types.iter().flat_map(|resource_type| {
                resource_type.entries.iter().flat_map(move |entry| {
                    entry
                        .config_values
                        .iter()
                        .map(move |value| (resource_type, entry, value))
                })
            })
        })
    }

    /// Copy of the table holding only the values accepted by `keep`; entries, types and
    /// packages left without values are dropped.
    pub fn filter_values(
        &self,
        keep: impl Fn(&ResourceType, &Entry, &ConfigValue) -> bool,
    ) -> ResourceTable {
        let packages = self
            .packages
            .iter()
            .filter_map(|package| {
                let types: Vec<ResourceType> = package
                    .types
                    .iter()
                    .filter_map(|resource_type| {
                        let entries: Vec<Entry> = resource_type
                            .entries
                            .iter()
                            .filter_map(|entry| {
                                let values: Vec<ConfigValue> = entry
                                    .config_values
                                    .iter()
                                    .filter(|value| keep(resource_type, entry, value))
                                    .cloned()
                                    .collect();
                                (!values.is_empty()).then(|| Entry {
                                    config_values: values,
                                    ..entry.clone()
                                })
                            })
                            .collect();
                        (!entries.is_empty()).then(|| ResourceType {
                            entries,
                            ..resource_type.clone()
                        })
                    })
                    .collect();
                (!types.is_empty()).then(|| Package {
                    types,
                    ..package.clone()
                })
            })
            .collect();
        ResourceTable {
            source_pool: self.source_pool.clone(),
            packages,
            overlayables: self.overlayables.clone(),
        }
    }

    /// Paths of the files (under `res/`) referenced by the table's values.
    pub fn referenced_files(&self) -> BTreeSet<String> {
        self.config_values()
            .flat_map(|(_, _, value)| value.value.items())
            .filter_map(|item| match item {
                Item::File(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawable_table() -> ResourceTable {
        ResourceTable::default().with_package(
            Package::new(0x7f, "com.example").with_type(
                ResourceType::new(1, "drawable").with_entry(
                    Entry::new(0, "icon")
                        .with_value(
                            Configuration::with_density(240),
                            Value::item(Item::File("res/drawable-hdpi/icon.png".into())),
                        )
                        .with_value(
                            Configuration::default(),
                            Value::item(Item::File("res/drawable/icon.png".into())),
                        ),
                ),
            ),
        )
    }

    #[test]
    fn language_of_locales() {
        assert_eq!(Configuration::with_locale("en-GB").language(), Some("en".into()));
        assert_eq!(Configuration::with_locale("b+sr+Latn").language(), Some("sr".into()));
        assert_eq!(Configuration::default().language(), None);
    }

    #[test]
    fn filtering_prunes_empty_containers() {
        let table = drawable_table();
        let none = table.filter_values(|_, _, _| false);
        assert!(none.is_empty());
        let hdpi = table.filter_values(|_, _, value| value.config.density == 240);
        assert_eq!(
            hdpi.referenced_files(),
            BTreeSet::from(["res/drawable-hdpi/icon.png".to_string()])
        );
    }

    #[test]
    fn density_markers_are_not_specific() {
        assert!(Configuration::with_density(480).is_density_specific());
        assert!(!Configuration::with_density(DENSITY_ANY).is_density_specific());
        assert!(!Configuration::default().is_density_specific());
    }
}
