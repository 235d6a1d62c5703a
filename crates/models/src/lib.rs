pub mod config;
pub mod error;
pub mod plan;
pub mod stage;

pub use config::*;
pub use error::*;
pub use plan::*;
pub use stage::*;
