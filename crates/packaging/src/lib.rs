pub mod cache;
pub mod context;
pub mod dockerfile;
pub mod image_builder;
pub mod manifest;
pub mod pipeline;

pub use cache::*;
pub use context::*;
pub use dockerfile::*;
pub use image_builder::*;
pub use manifest::*;
pub use pipeline::*;
