use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU architectures a native library directory can target.
///
/// Declaration order follows the platform alias numbering, which is also the order
/// splits are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Abi {
    #[serde(rename = "armeabi")]
    Armeabi,
    #[serde(rename = "armeabi-v7a")]
    ArmeabiV7a,
    #[serde(rename = "arm64-v8a")]
    Arm64V8a,
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "mips")]
    Mips,
    #[serde(rename = "mips64")]
    Mips64,
    #[serde(rename = "riscv64")]
    Riscv64,
}

impl Abi {
    pub const ALL: [Abi; 8] = [
        Abi::Armeabi,
        Abi::ArmeabiV7a,
        Abi::Arm64V8a,
        Abi::X86,
        Abi::X86_64,
        Abi::Mips,
        Abi::Mips64,
        Abi::Riscv64,
    ];

    /// Directory name used under `lib/`.
    pub fn platform_name(&self) -> &'static str {
        match self {
            Abi::Armeabi => "armeabi",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::Arm64V8a => "arm64-v8a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
            Abi::Mips => "mips",
            Abi::Mips64 => "mips64",
            Abi::Riscv64 => "riscv64",
        }
    }

    pub fn from_platform_name(name: &str) -> Option<Abi> {
        Abi::ALL.into_iter().find(|abi| abi.platform_name() == name)
    }

    pub fn is_64_bit(&self) -> bool {
        matches!(self, Abi::Arm64V8a | Abi::X86_64 | Abi::Mips64 | Abi::Riscv64)
    }

    /// 32-bit ABIs able to run on a device of this 64-bit ABI.
    pub fn fallbacks_32_bit(&self) -> &'static [Abi] {
        match self {
            Abi::Arm64V8a => &[Abi::ArmeabiV7a, Abi::Armeabi],
            Abi::X86_64 => &[Abi::X86],
            Abi::Mips64 => &[Abi::Mips],
            _ => &[],
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.platform_name())
    }
}

/// Screen density expressed in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScreenDensity(pub u32);

impl ScreenDensity {
    pub const LDPI: ScreenDensity = ScreenDensity(120);
    pub const MDPI: ScreenDensity = ScreenDensity(160);
    pub const TVDPI: ScreenDensity = ScreenDensity(213);
    pub const HDPI: ScreenDensity = ScreenDensity(240);
    pub const XHDPI: ScreenDensity = ScreenDensity(320);
    pub const XXHDPI: ScreenDensity = ScreenDensity(480);
    pub const XXXHDPI: ScreenDensity = ScreenDensity(640);

    /// Buckets a density split is generated for.
    pub const BUCKETS: [ScreenDensity; 7] = [
        ScreenDensity::LDPI,
        ScreenDensity::MDPI,
        ScreenDensity::TVDPI,
        ScreenDensity::HDPI,
        ScreenDensity::XHDPI,
        ScreenDensity::XXHDPI,
        ScreenDensity::XXXHDPI,
    ];

    pub fn dpi(&self) -> u32 {
        self.0
    }

    pub fn alias_name(&self) -> Option<&'static str> {
        match self.0 {
            120 => Some("ldpi"),
            160 => Some("mdpi"),
            213 => Some("tvdpi"),
            240 => Some("hdpi"),
            320 => Some("xhdpi"),
            480 => Some("xxhdpi"),
            640 => Some("xxxhdpi"),
            _ => None,
        }
    }
}

impl fmt::Display for ScreenDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alias_name() {
            Some(alias) => f.write_str(alias),
            None => write!(f, "{}dpi", self.0),
        }
    }
}

/// GPU texture compression formats an assets directory can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureCompressionFormat {
    Etc1Rgb8,
    Paletted,
    #[serde(rename = "3dc")]
    ThreeDc,
    Atc,
    Latc,
    Dxt1,
    S3tc,
    Pvrtc,
    Astc,
    Etc2,
}

impl TextureCompressionFormat {
    pub const ALL: [TextureCompressionFormat; 10] = [
        TextureCompressionFormat::Etc1Rgb8,
        TextureCompressionFormat::Paletted,
        TextureCompressionFormat::ThreeDc,
        TextureCompressionFormat::Atc,
        TextureCompressionFormat::Latc,
        TextureCompressionFormat::Dxt1,
        TextureCompressionFormat::S3tc,
        TextureCompressionFormat::Pvrtc,
        TextureCompressionFormat::Astc,
        TextureCompressionFormat::Etc2,
    ];

    /// Token used after `#tcf_` in directory names.
    pub fn token(&self) -> &'static str {
        match self {
            TextureCompressionFormat::Etc1Rgb8 => "etc1_rgb8",
            TextureCompressionFormat::Paletted => "paletted",
            TextureCompressionFormat::ThreeDc => "3dc",
            TextureCompressionFormat::Atc => "atc",
            TextureCompressionFormat::Latc => "latc",
            TextureCompressionFormat::Dxt1 => "dxt1",
            TextureCompressionFormat::S3tc => "s3tc",
            TextureCompressionFormat::Pvrtc => "pvrtc",
            TextureCompressionFormat::Astc => "astc",
            TextureCompressionFormat::Etc2 => "etc2",
        }
    }

    pub fn from_token(token: &str) -> Option<TextureCompressionFormat> {
        TextureCompressionFormat::ALL
            .into_iter()
            .find(|format| format.token() == token)
    }
}

impl fmt::Display for TextureCompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Sanitizer builds of native libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sanitizer {
    Hwaddress,
}

impl Sanitizer {
    /// Suffix appended to the ABI directory name, e.g. `lib/arm64-v8a-hwasan`.
    pub fn directory_suffix(&self) -> &'static str {
        match self {
            Sanitizer::Hwaddress => "-hwasan",
        }
    }
}

impl fmt::Display for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sanitizer::Hwaddress => f.write_str("hwasan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_names_roundtrip() {
        for abi in Abi::ALL {
            assert_eq!(Abi::from_platform_name(abi.platform_name()), Some(abi));
        }
        assert_eq!(Abi::from_platform_name("arm64"), None);
    }

    #[test]
    fn riscv_has_no_32_bit_fallback() {
        assert!(Abi::Riscv64.is_64_bit());
        assert!(Abi::Riscv64.fallbacks_32_bit().is_empty());
        assert_eq!(Abi::X86_64.fallbacks_32_bit(), &[Abi::X86]);
    }

    #[test]
    fn density_display_uses_alias() {
        assert_eq!(ScreenDensity::XHDPI.to_string(), "xhdpi");
        assert_eq!(ScreenDensity(400).to_string(), "400dpi");
    }

    #[test]
    fn texture_tokens() {
        assert_eq!(
            TextureCompressionFormat::from_token("3dc"),
            Some(TextureCompressionFormat::ThreeDc)
        );
        assert_eq!(TextureCompressionFormat::Etc1Rgb8.token(), "etc1_rgb8");
    }
}
