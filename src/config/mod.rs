pub mod load;
pub mod types;
pub mod validate;

pub use types::{
    CatalogSettings, ExtractionSettings, PathMapping, PathMappingSettings, RunMode, Settings,
    StorageBackend,
};
