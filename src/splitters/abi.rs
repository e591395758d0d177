use crate::error::BundleResult;
use crate::model::split::ModuleSplit;
use crate::splitters::{require_splits_when_fanned_out, ModuleSplitSplitter};
use crate::targeting::generator::LIB_DIRECTORY;
use crate::targeting::{Abi, ApkTargeting, Targeting};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};

/// Splits native libraries by ABI, one non-master split per ABI found in the module.
pub struct AbiNativeLibrariesSplitter {
    include_64_bit_libs: bool,
}

impl AbiNativeLibrariesSplitter {
    pub fn new(include_64_bit_libs: bool) -> Self {
        AbiNativeLibrariesSplitter {
            include_64_bit_libs,
        }
    }
}

impl ModuleSplitSplitter for AbiNativeLibrariesSplitter {
    fn split(&self, split: &ModuleSplit) -> BundleResult<Vec<ModuleSplit>> {
        let Some(config) = &split.native_config else {
            return Ok(vec![split.clone()]);
        };
        if split.entries_under(LIB_DIRECTORY).next().is_none() {
            return Ok(vec![split.clone()]);
        }

        let abi_of_directory: BTreeMap<&str, Abi> = config
            .directories
            .iter()
            .filter_map(|dir| Some((dir.path.as_str(), dir.targeting.abi?)))
            .collect();
        let mut by_abi: BTreeMap<Abi, Vec<_>> = BTreeMap::new();
        let mut unclaimed = Vec::new();
        for entry in &split.entries {
            match abi_of_directory.get(entry.directory()) {
                Some(abi) => by_abi.entry(*abi).or_default().push(entry.clone()),
                None => unclaimed.push(entry.clone()),
            }
        }

        if !self.include_64_bit_libs {
            let present: BTreeSet<Abi> = by_abi.keys().copied().collect();
            let orphaned = present.iter().any(|abi| {
                abi.is_64_bit()
                    && !abi
                        .fallbacks_32_bit()
                        .iter()
                        .any(|fallback| present.contains(fallback))
            });
            if orphaned {
                fail!(
                    "Generation of 64-bit native libraries is disabled, but App Bundle contains \
                     only 64-bit native libraries."
                );
            }
            by_abi.retain(|abi, _| {
                if abi.is_64_bit() {
                    warn!("Dropping 64-bit native libraries of '{}' for ABI {}.", split.module_name, abi);
                }
                !abi.is_64_bit()
            });
        }

        let observed: Vec<Abi> = by_abi.keys().copied().collect();
        let mut splits = Vec::new();
        if !unclaimed.is_empty() {
            splits.push(split.clone().with_entries(unclaimed));
        }
        for (abi, entries) in by_abi {
            let targeting = split.apk_targeting.merge(
                &ApkTargeting::default()
                    .with_abi(Targeting::with_alternatives(abi, observed.iter().copied())),
            )?;
            splits.push(
                split
                    .clone()
                    .with_entries(entries)
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
    use crate::targeting::VariantTargeting;

    fn native_split(paths: &[&str]) -> ModuleSplit {
        let mut module = BundleModule::new("base", AndroidManifest::for_package("com.example"));
        for path in paths {
            module = module.with_entry(*path, path.as_bytes().to_vec());
        }
        let module = module.with_generated_targeting().unwrap();
        ModuleSplit::for_native_libraries(&module, &VariantTargeting::l_plus())
    }

    #[test]
    fn alternatives_are_the_other_abis() {
        let splits = AbiNativeLibrariesSplitter::new(true)
            .split(&native_split(&["lib/x86/liba.so", "lib/arm64-v8a/liba.so"]))
            .unwrap();
        assert_eq!(splits.len(), 2);
        let arm = splits[0].apk_targeting.abi.as_ref().unwrap();
        assert_eq!(arm.single_value(), Some(&Abi::Arm64V8a));
        assert_eq!(arm.alternatives, BTreeSet::from([Abi::X86]));
        assert!(splits.iter().all(|split| !split.is_master));
    }

    #[test]
    fn drops_64_bit_when_fallback_present() {
        let splits = AbiNativeLibrariesSplitter::new(false)
            .split(&native_split(&["lib/x86/liba.so", "lib/x86_64/liba.so"]))
            .unwrap();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].entries[0].path, "lib/x86/liba.so");
        assert!(splits[0].master_manifest_mutators.is_empty());
    }

    #[test]
    fn no_native_entries_is_identity() {
        let split = native_split(&["assets/a.txt"]);
        assert_eq!(AbiNativeLibrariesSplitter::new(true).split(&split).unwrap(), vec![split]);
    }
}
