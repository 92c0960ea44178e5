pub mod catalog;
pub mod constants;
mod fields;
mod fill;
mod flatten;
pub mod io;
mod merge;
mod placement;
mod render;
pub mod store;
mod types;

pub use catalog::{TemplateCatalog, TemplateMetadata};
pub use fields::field_definitions;
pub use fill::{fill, fill_document, fill_fields};
pub use flatten::flatten;
pub use io::{fill_to_path, flatten_to_path, load_pdf, merge_files, save_pdf};
pub use merge::{load_merge_sources, merge};
pub use placement::compute_placement;
pub use store::{
    DirectoryBundle, MemoryBundle, SeedReport, Template, TemplateBundle, TemplateDescriptor,
    TemplateStore,
};
pub use types::*;
