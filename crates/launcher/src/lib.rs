pub mod container;
pub mod docker;

pub use container::*;
pub use docker::*;
