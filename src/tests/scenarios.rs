use std::collections::BTreeMap;

use crate::android::manifest::ManifestValue;
use crate::android::manifest_merger::{merge_manifests, MergeMode};
use crate::model::config::{ApkGenerationConfiguration, OptimizationDimensions, SuffixStripping};
use crate::model::module::BundleModule;
use crate::model::split::ModuleSplit;
use crate::splitters::{
    AbiNativeLibrariesSplitter, AssetsDimensionSplitter, DexCompressionSplitter, ModuleSplitSplitter,
    ModuleSplitter,
};
use crate::targeting::{Abi, ApkTargeting, Targeting, TextureCompressionFormat, VariantTargeting};
use crate::tests::fixtures::{
    manifest_with_activities, manifest_with_sdk, module_with, themed_activity, PACKAGE,
};
use crate::variants::VariantGenerator;

#[test]
fn single_abi_library_becomes_one_config_split() {
    let module = module_with("base", &["lib/x86/libnoname.so"]);
    let split = ModuleSplit::for_native_libraries(&module, &VariantTargeting::l_plus());
    let splits = AbiNativeLibrariesSplitter::new(true)
        .split(&split)
        .expect("split by abi");

    assert_eq!(splits.len(), 1);
    let split = &splits[0];
    assert_eq!(
        split.apk_targeting,
        ApkTargeting::default().with_abi(Targeting::value(Abi::X86))
    );
    assert_eq!(split.variant_targeting, VariantTargeting::l_plus());
    let paths: Vec<&str> = split.entries.iter().map(|entry| entry.path.as_str()).collect();
    assert_eq!(paths, vec!["lib/x86/libnoname.so"]);
    assert!(!split.is_master);
}

#[test]
fn only_64_bit_libraries_with_64_bit_disabled_is_fatal() {
    let module = module_with(
        "base",
        &[
            "lib/armeabi-v7a/libfoo.so",
            "lib/arm64-v8a/libfoo.so",
            "lib/x86_64/libfoo.so",
        ],
    );
    let split = ModuleSplit::for_native_libraries(&module, &VariantTargeting::l_plus());
    let err = AbiNativeLibrariesSplitter::new(false)
        .split(&split)
        .expect_err("x86_64 has no 32-bit fallback");
    assert!(err.to_string().contains(
        "Generation of 64-bit native libraries is disabled, but App Bundle contains only 64-bit \
         native libraries."
    ));
}

#[test]
fn feature_themes_override_base_activities() {
    const BASE_THEME: u32 = 0x7f0f0001;
    const FEATURE1_THEME: u32 = 0x7f0f0002;
    const FEATURE2_THEME: u32 = 0x7f0f0003;

    let mut manifests = BTreeMap::new();
    manifests.insert(
        "base".to_string(),
        vec![manifest_with_activities(vec![
            themed_activity("activity1", BASE_THEME),
            themed_activity("activity2", BASE_THEME),
            themed_activity("activity3", BASE_THEME),
        ])],
    );
    manifests.insert(
        "feature1".to_string(),
        vec![manifest_with_activities(vec![themed_activity("activity1", FEATURE1_THEME)])],
    );
    manifests.insert(
        "feature2".to_string(),
        vec![manifest_with_activities(vec![themed_activity("activity3", FEATURE2_THEME)])],
    );

    let merged = merge_manifests(&manifests, MergeMode::Replace).expect("merge manifests");
    assert_eq!(merged.package_name(), Some(PACKAGE));
    let themes: BTreeMap<&str, u32> = merged
        .application()
        .expect("application element")
        .children_named("activity")
        .filter_map(|activity| {
            let theme = activity
                .attribute_value("android:theme")
                .and_then(ManifestValue::as_reference_id)?;
            Some((activity.android_name()?, theme))
        })
        .collect();
    assert_eq!(
        themes,
        BTreeMap::from([
            ("activity1", FEATURE1_THEME),
            ("activity2", BASE_THEME),
            ("activity3", FEATURE2_THEME),
        ])
    );
}

#[test]
fn dex_is_stored_uncompressed_from_p() {
    let config = ApkGenerationConfiguration::default();
    let module = module_with("base", &["dex/classes.dex"]);
    let splitter = DexCompressionSplitter::new(&config);

    let p = splitter
        .split(&ModuleSplit::for_dex(&module, &VariantTargeting::sdk(28)))
        .expect("split at P");
    assert_eq!(p.len(), 1);
    assert!(p[0].find_entry("dex/classes.dex").expect("dex entry").force_uncompressed);

    let o = splitter
        .split(&ModuleSplit::for_dex(&module, &VariantTargeting::sdk(26)))
        .expect("split at O");
    assert_eq!(o.len(), 1);
    assert!(!o[0].find_entry("dex/classes.dex").expect("dex entry").force_uncompressed);
}

#[test]
fn missing_low_tier_still_gets_an_empty_split() {
    let module = module_with("base", &["assets/img#tier_1/a.png", "assets/img#tier_2/a.png"]);
    let split = ModuleSplit::for_assets(&module, &VariantTargeting::l_plus());
    let splits = AssetsDimensionSplitter::device_tier(&SuffixStripping::default())
        .split(&split)
        .expect("split by tier");

    let tier_zero = splits
        .iter()
        .find(|split| {
            split
                .apk_targeting
                .device_tier
                .as_ref()
                .and_then(Targeting::single_value)
                == Some(&0)
        })
        .expect("tier 0 split");
    assert!(tier_zero.entries.is_empty());
    assert!(!tier_zero.is_master);
    let tiers: Vec<u32> = splits
        .iter()
        .filter_map(|split| split.apk_targeting.device_tier.as_ref())
        .filter_map(|tier| tier.single_value().copied())
        .collect();
    assert_eq!(tiers, vec![0, 1, 2]);
}

fn native_only_variants(min_sdk: Option<u32>, max_sdk: Option<u32>) -> Vec<u32> {
    let config = ApkGenerationConfiguration::default();
    let module = BundleModule::new("base", manifest_with_sdk(min_sdk, max_sdk))
        .with_entry("lib/x86/libfoo.so", vec![1]);
    VariantGenerator::new(&config)
        .generate_variants(&module)
        .expect("generate variants")
        .iter()
        .filter_map(VariantTargeting::min_sdk)
        .collect()
}

#[test]
fn threshold_equal_to_min_sdk_adds_no_variant() {
    assert_eq!(native_only_variants(Some(23), None), vec![21]);
    assert_eq!(native_only_variants(Some(22), None), vec![21, 23]);
}

#[test]
fn threshold_equal_to_max_sdk_still_splits() {
    assert_eq!(native_only_variants(None, Some(23)), vec![21, 23]);
    assert_eq!(native_only_variants(None, Some(22)), vec![21]);
}

#[test]
fn texture_and_tier_tagged_assets_split_in_both_dimensions() {
    let config = ApkGenerationConfiguration {
        optimization_dimensions: OptimizationDimensions::TEXTURE_COMPRESSION_FORMAT
            | OptimizationDimensions::DEVICE_TIER,
        texture_suffix_stripping: SuffixStripping::enabled_with_default("etc2"),
        ..ApkGenerationConfiguration::default()
    };
    let module = module_with(
        "base",
        &[
            "assets/tex#tcf_astc/lvl#tier_1/a.ktx",
            "assets/tex#tcf_astc/lvl#tier_2/a.ktx",
            "assets/tex#tcf_etc2/lvl#tier_1/a.ktx",
        ],
    );
    let variant = VariantTargeting::l_plus();
    let splits = ModuleSplitter::new(&module, &variant, &config)
        .split_module()
        .expect("split module");

    let mut targeted: Vec<(TextureCompressionFormat, u32, Vec<&str>)> = splits
        .iter()
        .filter_map(|split| {
            let format = split.apk_targeting.texture_compression_format.as_ref()?.single_value()?;
            let tier = split.apk_targeting.device_tier.as_ref()?.single_value()?;
            let paths = split.entries.iter().map(|entry| entry.path.as_str()).collect();
            Some((*format, *tier, paths))
        })
        .collect();
    targeted.sort();
    assert_eq!(
        targeted,
        vec![
            (TextureCompressionFormat::Astc, 0, vec![]),
            (TextureCompressionFormat::Astc, 1, vec!["assets/tex/lvl#tier_1/a.ktx"]),
            (TextureCompressionFormat::Astc, 2, vec!["assets/tex/lvl#tier_2/a.ktx"]),
            (TextureCompressionFormat::Etc2, 0, vec![]),
            (TextureCompressionFormat::Etc2, 1, vec!["assets/tex/lvl#tier_1/a.ktx"]),
        ]
    );
    assert!(splits
        .iter()
        .filter(|split| !split.entries.is_empty())
        .all(|split| split.apk_targeting.device_tier.is_some()));
}
