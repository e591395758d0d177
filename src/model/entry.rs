/// A single file of a module or split.
///
/// Entries are plain values: splitters never edit one in place, they rebuild it through
/// the `with_*` helpers so the input split stays untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModuleEntry {
    pub path: String,
    pub content: Vec<u8>,
    pub force_uncompressed: bool,
}

impl ModuleEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        ModuleEntry {
            path: path.into(),
            content: content.into(),
            force_uncompressed: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_force_uncompressed(mut self, force_uncompressed: bool) -> Self {
        self.force_uncompressed = force_uncompressed;
        self
    }

    /// True when the entry lives below `directory` (at any depth).
    pub fn is_under(&self, directory: &str) -> bool {
        self.path
            .strip_prefix(directory)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Directory directly containing the entry.
    pub fn directory(&self) -> &str {
        crate::targeting::directories::parent_directory(&self.path)
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
