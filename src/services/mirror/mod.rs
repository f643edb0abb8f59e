pub mod scoped;
pub mod store;

pub use scoped::*;
pub use store::*;
