pub use util::*;

pub mod trail;
pub mod util;
