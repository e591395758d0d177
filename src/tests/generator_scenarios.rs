use crate::android::manifest::ManifestValue;
use crate::injectors::{BASELINE_PROFILE_PATH, CODE_TRANSPARENCY_PATH};
use crate::model::config::ApkGenerationConfiguration;
use crate::model::metadata::{BundleMetadata, BUNDLETOOL_NAMESPACE, PROFILES_NAMESPACE};
use crate::model::module::{BundleModule, ModuleType};
use crate::model::split::SplitType;
use crate::sharding::{ShardedApksGenerator, SplitApksGenerator};
use crate::tests::fixtures::{manifest_with_sdk, module_with};

fn bundle() -> Vec<BundleModule> {
    let base = BundleModule::new("base", manifest_with_sdk(Some(19), None))
        .with_entry("dex/classes.dex", b"base-dex".to_vec())
        .with_entry("lib/x86/libbase.so", b"base-x86".to_vec())
        .with_entry("lib/armeabi-v7a/libbase.so", b"base-arm".to_vec());
    let feature = module_with("camera", &["dex/classes.dex", "lib/x86/libcamera.so"]);
    vec![base, feature]
}

#[test]
fn feature_config_splits_name_their_module() {
    let config = ApkGenerationConfiguration::default();
    let metadata = BundleMetadata::default();
    let apks = SplitApksGenerator::new(&config, &metadata)
        .generate_split_apks(&bundle())
        .expect("generate split apks");

    for splits in apks.values() {
        let camera_x86 = splits
            .iter()
            .find(|split| split.module_name == "camera" && !split.is_master)
            .expect("camera abi split");
        assert_eq!(camera_x86.manifest.split_id(), Some("camera.config.x86"));
        assert_eq!(
            camera_x86.manifest.root().attribute_value("configForSplit"),
            Some(&ManifestValue::from("camera"))
        );
        let base_x86 = splits
            .iter()
            .find(|split| split.find_entry("lib/x86/libbase.so").is_some())
            .expect("base abi split");
        assert_eq!(base_x86.manifest.split_id(), Some("config.x86"));
    }
}

#[test]
fn standalone_shards_fuse_every_module() {
    let config = ApkGenerationConfiguration::default();
    let metadata = BundleMetadata::default()
        .with_file(PROFILES_NAMESPACE, "baseline.prof", b"prof".to_vec())
        .with_file(BUNDLETOOL_NAMESPACE, "code_transparency_signed.jwt", b"jwt".to_vec());
    let shards = ShardedApksGenerator::new(&config, &metadata)
        .generate_standalone_shards(&bundle())
        .expect("generate standalone shards");

    assert_eq!(shards.len(), 2);
    let x86 = shards
        .iter()
        .find(|shard| shard.find_entry("lib/x86/libbase.so").is_some())
        .expect("x86 shard");
    assert!(x86.find_entry("lib/x86/libcamera.so").is_some());
    assert!(x86.find_entry("lib/armeabi-v7a/libbase.so").is_none());
    assert_eq!(
        x86.find_entry("dex/classes.dex").expect("base dex").content,
        b"base-dex"
    );
    assert_eq!(
        x86.find_entry("dex/classes2.dex").expect("camera dex").content,
        b"dex/classes.dex"
    );
    for shard in &shards {
        assert_eq!(shard.split_type, SplitType::Standalone);
        assert!(shard.find_entry(BASELINE_PROFILE_PATH).expect("profile").force_uncompressed);
        assert!(shard.find_entry(CODE_TRANSPARENCY_PATH).is_some());
    }
}

#[test]
fn asset_packs_are_sliced_not_fused() {
    let config = ApkGenerationConfiguration::default();
    let metadata = BundleMetadata::default();
    let pack = module_with("levels", &["assets/levels#tcf_astc/1.bin", "assets/levels#tcf_etc2/1.bin"])
        .with_module_type(ModuleType::AssetOnly);
    let mut modules = bundle();
    modules.push(pack);
    let apks = SplitApksGenerator::new(&config, &metadata)
        .generate_split_apks(&modules)
        .expect("generate split apks");

    let slices: Vec<_> = apks
        .values()
        .next()
        .expect("one variant at least")
        .iter()
        .filter(|split| split.module_name == "levels")
        .collect();
    assert!(!slices.is_empty());
    assert!(slices.iter().all(|split| split.split_type == SplitType::AssetSlice));
}
