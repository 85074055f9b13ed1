pub mod analysis_worker;
pub mod domain;
pub mod handlers;
pub mod router;

pub use analysis_worker::*;
pub use domain::*;
pub use handlers::*;
pub use router::*;
