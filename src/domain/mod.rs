pub mod hash;
pub mod node;

pub use hash::*;
pub use node::*;
