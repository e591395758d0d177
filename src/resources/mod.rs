pub mod merger;
pub mod table;

pub use merger::{merge, merge_all};
pub use table::{ConfigValue, Configuration, Entry, Package, ResourceTable, ResourceType};
