//! PDF rendering modules for form filling
//!
//! This module handles the low-level PDF edits shared by filling and flattening:
//! - Appending content streams to existing pages
//! - Registering XObjects in page resources
//! - Embedding raster images

mod content;
mod raster;

pub use content::*;
pub use raster::embed_image;
