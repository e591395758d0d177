use thiserror::Error;

/// Returns early with an [`BundleError::InvalidBundle`] built from a format string.
#[macro_export]
macro_rules! fail {
    ($msg:literal) => {
        return Err($crate::error::BundleError::InvalidBundle(format!($msg)))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err($crate::error::BundleError::InvalidBundle(format!($fmtstr, $($args)*)))
    };
}

/// Result alias used throughout the splitting core.
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors surfaced while splitting, merging or fusing bundle modules.
///
/// Every variant is fatal: the bundle cannot be turned into APKs as given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// The bundle's modules or configuration contradict each other.
    #[error("{0}")]
    InvalidBundle(String),
    /// Two resource tables disagree on a field that identifies or describes a resource.
    #[error(
        "Expected same values of field '{field}' for {location}, but got '{first}' and '{second}'."
    )]
    ResourceTableConflict {
        field: &'static str,
        location: String,
        first: String,
        second: String,
    },
    /// An overlayable is declared twice with different actors.
    #[error("Overlayable '{name}' is declared with conflicting actors '{first}' and '{second}'.")]
    OverlayableConflict {
        name: String,
        first: String,
        second: String,
    },
    /// Manifests of the fused modules cannot be merged.
    #[error("{0}")]
    ManifestMerge(String),
    /// The generation configuration could not be read.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Textual manifest parsing or generation failure.
    #[error("XML error: {0}")]
    Xml(String),
}

impl From<quick_xml::Error> for BundleError {
    fn from(value: quick_xml::Error) -> Self {
        BundleError::Xml(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for BundleError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        BundleError::Xml(value.to_string())
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(value: serde_json::Error) -> Self {
        BundleError::Config(value.to_string())
    }
}

impl From<std::io::Error> for BundleError {
    fn from(value: std::io::Error) -> Self {
        BundleError::Xml(value.to_string())
    }
}
