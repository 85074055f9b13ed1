mod analysis_router;
mod predicate;

pub use analysis_router::*;
pub use predicate::*;
