use crate::android::manifest::AndroidManifest;

/// A deferred manifest edit.
///
/// Splitters attach mutators to splits instead of rewriting manifests; the queue is
/// applied once, in registration order, when the split is finalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestMutator {
    /// Sets `android:isSplitRequired` on the application.
    SplitsRequired(bool),
    /// Sets `android:extractNativeLibs` on the application.
    ExtractNativeLibs(bool),
}

impl ManifestMutator {
    pub fn apply(&self, manifest: &mut AndroidManifest) {
        match self {
            ManifestMutator::SplitsRequired(required) => {
                manifest.set_application_attribute("isSplitRequired", *required)
            }
            ManifestMutator::ExtractNativeLibs(extract) => {
                manifest.set_application_attribute("extractNativeLibs", *extract)
            }
        }
    }
}

/// Appends `mutator` unless an identical edit is already queued.
pub(crate) fn push_unique(queue: &mut Vec<ManifestMutator>, mutator: ManifestMutator) {
    if !queue.contains(&mutator) {
        queue.push(mutator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::manifest::ManifestValue;

    #[test]
    fn mutators_apply_in_order() {
        let mut manifest = AndroidManifest::for_package("com.example");
        for mutator in [
            ManifestMutator::ExtractNativeLibs(true),
            ManifestMutator::ExtractNativeLibs(false),
        ] {
            mutator.apply(&mut manifest);
        }
        assert_eq!(
            manifest.application_attribute("extractNativeLibs"),
            Some(&ManifestValue::Boolean(false))
        );
    }

    #[test]
    fn queue_skips_duplicates() {
        let mut queue = Vec::new();
        push_unique(&mut queue, ManifestMutator::SplitsRequired(true));
        push_unique(&mut queue, ManifestMutator::SplitsRequired(true));
        assert_eq!(queue.len(), 1);
    }
}
