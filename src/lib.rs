//! # bundlesplit
//!
//! Splits the modules of an Android App Bundle into targeted APK sets.
//!
//! Modules come in already parsed ([`model::BundleModule`]). Each module is cut into
//! [`model::ModuleSplit`]s by the dimension and compression splitters, per SDK variant,
//! and the splits are either grouped by variant ([`sharding::SplitApksGenerator`]) or
//! fused into standalone and system APKs ([`sharding::ShardedApksGenerator`]).
//!
//! ```
//! use bundlesplit::android::AndroidManifest;
//! use bundlesplit::model::{ApkGenerationConfiguration, BundleMetadata, BundleModule};
//! use bundlesplit::sharding::SplitApksGenerator;
//!
//! let base = BundleModule::new("base", AndroidManifest::for_package("com.example"))
//!     .with_entry("lib/x86/libgame.so", vec![0x7f, b'E', b'L', b'F'])
//!     .with_entry("dex/classes.dex", b"dex\n035\0".to_vec());
//! let config = ApkGenerationConfiguration::default();
//! let metadata = BundleMetadata::default();
//! let apks = SplitApksGenerator::new(&config, &metadata)
//!     .generate_split_apks(&[base])
//!     .unwrap();
//! println!("{} variants", apks.len());
//! ```

#[macro_use]
pub mod error;

pub mod android;
pub mod injectors;
pub mod model;
pub mod resources;
pub mod sharding;
pub mod splitters;
pub mod targeting;
pub mod variants;

#[cfg(test)]
mod tests;

pub use error::{BundleError, BundleResult};
pub use model::{ApkGenerationConfiguration, BundleModule, ModuleSplit};
pub use sharding::{ShardedApksGenerator, SplitApksGenerator};
pub use variants::{VariantGenerator, VariantTargetingGenerator};
