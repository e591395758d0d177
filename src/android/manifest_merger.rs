//! Fuses the manifests of several modules into the manifest of one shard.
//!
//! Feature modules are visited in lexicographic order of their names and base last.
//! For every mergeable component declared by more than one module the latest feature
//! declaration wins; a base declaration tagged `android:splitName="S"` competes as if
//! module `S` contributed it, below `S`'s own declaration.

use crate::android::manifest::{
    AndroidManifest, ManifestElement, INTENT_FILTER_ELEMENT, META_DATA_ELEMENT,
};
use crate::error::{BundleError, BundleResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BASE_MODULE_NAME: &str = "base";

const MERGEABLE_ELEMENTS: [&str; 5] = ["activity", "activity-alias", "service", "receiver", "provider"];

/// How two declarations of the same component are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// The winning declaration replaces the others wholesale.
    #[default]
    Replace,
    /// Intent filters and meta-data are gathered from every declaration.
    MergeChildren,
}

/// A declaration of one component together with its precedence.
struct Candidate<'a> {
    /// `(module rank, 1)` for a feature, `(module rank, 0)` for base with a split name,
    /// `(-1, 0)` for plain base declarations.
    priority: (i64, u8),
    element: &'a ManifestElement,
}

type ComponentKey = (String, String);

fn component_key(element: &ManifestElement) -> Option<ComponentKey> {
    if !MERGEABLE_ELEMENTS.contains(&element.tag.as_str()) {
        return None;
    }
    Some((element.tag.clone(), element.android_name()?.to_string()))
}

fn single_manifest<'a>(
    manifests: &'a BTreeMap<String, Vec<AndroidManifest>>,
    module: &str,
) -> BundleResult<&'a AndroidManifest> {
    let found = manifests.get(module).map(Vec::as_slice).unwrap_or_default();
    match found {
        [manifest] => Ok(manifest),
        _ => Err(BundleError::ManifestMerge(format!(
            "Expected exactly one {module} module manifest, but found {}.",
            found.len()
        ))),
    }
}

/// Merges the manifests of the given modules, keyed by module name.
pub fn merge_manifests(
    manifests: &BTreeMap<String, Vec<AndroidManifest>>,
    mode: MergeMode,
) -> BundleResult<AndroidManifest> {
    if !manifests.contains_key(BASE_MODULE_NAME) {
        return Err(BundleError::ManifestMerge("Expected to have base module.".to_string()));
    }
    let base = single_manifest(manifests, BASE_MODULE_NAME)?;
    let features: Vec<(&str, &AndroidManifest)> = manifests
        .keys()
        .filter(|name| name.as_str() != BASE_MODULE_NAME)
        .map(|name| single_manifest(manifests, name).map(|manifest| (name.as_str(), manifest)))
        .collect::<BundleResult<_>>()?;
    let rank = |module: &str| {
        features
            .iter()
            .position(|(name, _)| *name == module)
            .and_then(|idx| i64::try_from(idx).ok())
    };

    // Components in first-seen order, features first.
    let mut order: Vec<ComponentKey> = Vec::new();
    let mut candidates: BTreeMap<ComponentKey, Vec<Candidate>> = BTreeMap::new();
    for (module, manifest) in &features {
        let Some(application) = manifest.application() else {
            continue;
        };
        let module_rank = rank(module).unwrap_or_default();
        for element in &application.children {
            if let Some(key) = component_key(element) {
                let candidate = Candidate {
                    priority: (module_rank, 1),
                    element,
                };
                record(&mut order, &mut candidates, key, candidate);
            }
        }
    }
    if let Some(application) = base.application() {
        for element in &application.children {
            if let Some(key) = component_key(element) {
                let owner = element
                    .attribute_value("android:splitName")
                    .and_then(|value| value.as_str())
                    .and_then(|split| rank(split));
                let priority = match owner {
                    Some(module_rank) => (module_rank, 0),
                    None => (-1, 0),
                };
                record(&mut order, &mut candidates, key, Candidate { priority, element });
            }
        }
    }

    let mut merged_components = BTreeMap::new();
    for (key, sources) in &candidates {
        let Some(winning) = winner(sources) else {
            continue;
        };
        let merged = match mode {
            MergeMode::Replace => winning.clone(),
            MergeMode::MergeChildren => merge_children(&key.0, &key.1, winning, sources)?,
        };
        merged_components.insert(key.clone(), merged);
    }

    let mut result = base.clone();
    let application = result.application_mut();
    for child in &mut application.children {
        if let Some(merged) = component_key(child).and_then(|key| merged_components.remove(&key)) {
            *child = merged;
        }
    }
    for key in order {
        if let Some(merged) = merged_components.remove(&key) {
            application.append_child(merged);
        }
    }
    debug!(
        "Merged manifests of {} feature modules into base ({} components).",
        features.len(),
        candidates.len()
    );
    Ok(result)
}

fn record<'a>(
    order: &mut Vec<ComponentKey>,
    candidates: &mut BTreeMap<ComponentKey, Vec<Candidate<'a>>>,
    key: ComponentKey,
    candidate: Candidate<'a>,
) {
    if !candidates.contains_key(&key) {
        order.push(key.clone());
    }
    candidates.entry(key).or_default().push(candidate);
}

fn winner<'a>(sources: &[Candidate<'a>]) -> Option<&'a ManifestElement> {
    // Later candidates win ties: every feature is recorded before base.
    sources
        .iter()
        .enumerate()
        .max_by_key(|(idx, candidate)| (candidate.priority, *idx))
        .map(|(_, candidate)| candidate.element)
}

fn merge_children(
    tag: &str,
    name: &str,
    winning: &ManifestElement,
    sources: &[Candidate<'_>],
) -> BundleResult<ManifestElement> {
    let mut merged = winning.clone();
    merged.children.retain(|child| {
        child.tag != INTENT_FILTER_ELEMENT
            && !(child.tag == META_DATA_ELEMENT && child.android_name().is_some())
    });

    let mut meta_data: Vec<&ManifestElement> = Vec::new();
    for candidate in sources {
        for child in &candidate.element.children {
            if child.tag == INTENT_FILTER_ELEMENT {
                merged.children.push(child.clone());
            } else if child.tag == META_DATA_ELEMENT {
                let Some(meta_name) = child.android_name() else {
                    continue;
                };
                match meta_data.iter().find(|seen| seen.android_name() == Some(meta_name)) {
                    Some(seen) if *seen != child => {
                        return Err(BundleError::ManifestMerge(format!(
                            "Multiple meta-data entries with the same name are found inside {tag}:{name}: {meta_name}"
                        )));
                    }
                    Some(_) => {}
                    None => meta_data.push(child),
                }
            }
        }
    }
    merged.children.extend(meta_data.into_iter().cloned());
    Ok(merged)
}
