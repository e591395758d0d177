//! Derives directory targeting configs from the entry paths of a module.
//!
//! Native libraries live in `lib/<abi>[-hwasan]/`. Assets directories carry their
//! targeting in path segments of the form `<name>#<key>_<value>` where key is one of
//! `tcf`, `lang` or `tier`; a directory inherits the tags of all its segments.

use crate::error::BundleResult;
use crate::targeting::directories::{
    parent_directory, Assets, AssetsDirectoryTargeting, NativeDirectoryTargeting, NativeLibraries,
    TargetedAssetsDirectory, TargetedNativeDirectory,
};
use crate::targeting::{Abi, Sanitizer, TextureCompressionFormat};
use log::debug;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::char;
use nom::combinator::{eof, opt, value};
use nom::IResult;
use std::collections::BTreeSet;

pub const LIB_DIRECTORY: &str = "lib";
pub const ASSETS_DIRECTORY: &str = "assets";

fn abi_token(input: &str) -> IResult<&str, Abi> {
    // Longer names first so that `x86_64` is not read as `x86`.
    alt((
        value(Abi::Arm64V8a, tag("arm64-v8a")),
        value(Abi::ArmeabiV7a, tag("armeabi-v7a")),
        value(Abi::Armeabi, tag("armeabi")),
        value(Abi::X86_64, tag("x86_64")),
        value(Abi::X86, tag("x86")),
        value(Abi::Mips64, tag("mips64")),
        value(Abi::Mips, tag("mips")),
        value(Abi::Riscv64, tag("riscv64")),
    ))(input)
}

fn native_directory_name(input: &str) -> IResult<&str, (Abi, Option<Sanitizer>)> {
    let (input, abi) = abi_token(input)?;
    let (input, sanitizer) = opt(value(Sanitizer::Hwaddress, tag("-hwasan")))(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (abi, sanitizer)))
}

fn targeted_segment(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = take_while1(|c: char| c != '#')(input)?;
    let (input, _) = char('#')(input)?;
    let (input, key) = alt((tag("tcf"), tag("lang"), tag("tier")))(input)?;
    let (input, _) = char('_')(input)?;
    let (input, val) = take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)?;
    let (input, _) = eof(input)?;
    Ok((input, (key, val)))
}

/// Builds the native libraries config for the given entry paths, `None` if the module
/// has no native libraries.
pub fn generate_native_targeting<'a>(
    paths: impl IntoIterator<Item = &'a str>,
) -> BundleResult<Option<NativeLibraries>> {
    let mut directories = BTreeSet::new();
    for path in paths {
        let Some(rest) = path.strip_prefix("lib/") else {
            continue;
        };
        match rest.split_once('/') {
            Some((dir, file)) if !file.contains('/') => {
                directories.insert(dir.to_string());
            }
            _ => fail!(
                "Native library '{}' must be located directly under an ABI directory.",
                path
            ),
        }
    }
    if directories.is_empty() {
        return Ok(None);
    }
    let mut native = NativeLibraries::default();
    for dir in directories {
        let (abi, sanitizer) = match native_directory_name(&dir) {
            Ok((_, parsed)) => parsed,
            Err(_) => fail!("Directory 'lib/{}' does not match any known ABI.", dir),
        };
        native.directories.push(TargetedNativeDirectory {
            path: format!("{LIB_DIRECTORY}/{dir}"),
            targeting: NativeDirectoryTargeting {
                abi: Some(abi),
                sanitizer,
            },
        });
    }
    debug!("Generated targeting for {} native directories.", native.directories.len());
    Ok(Some(native))
}

fn assets_directory_targeting(directory: &str) -> BundleResult<AssetsDirectoryTargeting> {
    let mut targeting = AssetsDirectoryTargeting::default();
    for segment in directory.split('/').filter(|segment| segment.contains('#')) {
        let (key, val) = match targeted_segment(segment) {
            Ok((_, parsed)) => parsed,
            Err(_) => fail!("Cannot parse targeting of directory '{}'.", directory),
        };
        let duplicate = match key {
            "tcf" => {
                let format = TextureCompressionFormat::from_token(val).ok_or_else(|| {
                    crate::error::BundleError::InvalidBundle(format!(
                        "Unrecognized texture compression format '{val}' in directory '{directory}'."
                    ))
                })?;
                targeting.texture_compression_format.replace(format).is_some()
            }
            "lang" => {
                if !val.chars().all(|c| c.is_ascii_lowercase()) || !(2..=3).contains(&val.len()) {
                    fail!("Invalid language '{}' in directory '{}'.", val, directory);
                }
                targeting.language.replace(val.to_string()).is_some()
            }
            _ => {
                let tier = val.parse::<u32>().map_err(|_| {
                    crate::error::BundleError::InvalidBundle(format!(
                        "Invalid device tier '{val}' in directory '{directory}'."
                    ))
                })?;
                targeting.device_tier.replace(tier).is_some()
            }
        };
        if duplicate {
            fail!("Multiple '{}' targetings in directory '{}'.", key, directory);
        }
    }
    Ok(targeting)
}

/// Builds the assets config for the given entry paths, `None` when no assets directory
/// carries targeting.
pub fn generate_assets_targeting<'a>(
    paths: impl IntoIterator<Item = &'a str>,
) -> BundleResult<Option<Assets>> {
    let directories: BTreeSet<&str> = paths
        .into_iter()
        .filter(|path| path.starts_with("assets/"))
        .map(parent_directory)
        .collect();
    let mut assets = Assets::default();
    for directory in directories {
        let targeting = assets_directory_targeting(directory)?;
        if !targeting.is_empty() {
            assets.directories.push(TargetedAssetsDirectory {
                path: directory.to_string(),
                targeting,
            });
        }
    }
    if assets.directories.is_empty() {
        Ok(None)
    } else {
        Ok(Some(assets))
    }
}

/// Removes `#<key>_<value>` tags from every segment of a path.
pub fn strip_targeting_suffixes(path: &str, key: &str) -> String {
    let marker = format!("#{key}_");
    path.split('/')
        .map(|segment| match segment.find(&marker) {
            Some(idx) => &segment[..idx],
            None => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abi_and_sanitizer_directories() {
        let native = generate_native_targeting([
            "lib/x86_64/libfoo.so",
            "lib/arm64-v8a-hwasan/libfoo.so",
            "lib/x86/libfoo.so",
            "dex/classes.dex",
        ])
        .unwrap()
        .unwrap();
        let dirs: Vec<_> = native
            .directories
            .iter()
            .map(|dir| (dir.path.as_str(), dir.targeting.abi, dir.targeting.sanitizer))
            .collect();
        assert_eq!(
            dirs,
            vec![
                ("lib/arm64-v8a-hwasan", Some(Abi::Arm64V8a), Some(Sanitizer::Hwaddress)),
                ("lib/x86", Some(Abi::X86), None),
                ("lib/x86_64", Some(Abi::X86_64), None),
            ]
        );
    }

    #[test]
    fn rejects_unknown_abi_directory() {
        assert!(generate_native_targeting(["lib/sparc/libfoo.so"]).is_err());
        assert!(generate_native_targeting(["lib/libfoo.so"]).is_err());
        assert_eq!(generate_native_targeting(["res/a.xml"]).unwrap(), None);
    }

    #[test]
    fn nested_assets_directories_inherit_tags() {
        let assets = generate_assets_targeting([
            "assets/textures#tcf_astc/level#tier_1/a.ktx",
            "assets/textures#tcf_astc/b.ktx",
            "assets/plain/c.txt",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(assets.directories.len(), 2);
        let nested = &assets.directories[1];
        assert_eq!(nested.path, "assets/textures#tcf_astc/level#tier_1");
        assert_eq!(
            nested.targeting.texture_compression_format,
            Some(TextureCompressionFormat::Astc)
        );
        assert_eq!(nested.targeting.device_tier, Some(1));
    }

    #[test]
    fn rejects_repeated_dimension() {
        assert!(generate_assets_targeting(["assets/a#lang_en/b#lang_fr/x.txt"]).is_err());
        assert!(generate_assets_targeting(["assets/a#tcf_foo/x.txt"]).is_err());
    }

    #[test]
    fn strips_only_requested_key() {
        assert_eq!(
            strip_targeting_suffixes("assets/img#tier_2/sub#lang_en/x.png", "tier"),
            "assets/img/sub#lang_en/x.png"
        );
    }
}
