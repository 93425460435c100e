pub mod money;
pub mod plan;
pub mod types;

pub use types::*;
