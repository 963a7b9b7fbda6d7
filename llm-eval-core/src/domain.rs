pub mod ids;
pub mod model;
pub mod dataset;
pub mod scheme;
pub mod task;
pub mod evaluation;
pub mod summary;

pub use ids::*;
pub use model::*;
pub use dataset::*;
pub use scheme::*;
pub use task::*;
pub use evaluation::*;
pub use summary::*;
