pub mod aggregators;
pub mod comparison;
pub mod normalizer;

pub use aggregators::*;
pub use comparison::*;
pub use normalizer::*;
