mod alert_dispatcher;
mod alert_state;
mod checkin_monitor;
mod geofence;
mod geometry;
mod tag_resolver;
mod usage_meter;

pub use alert_dispatcher::*;
pub use alert_state::*;
pub use checkin_monitor::*;
pub use geofence::*;
pub use geometry::*;
pub use tag_resolver::*;
pub use usage_meter::*;
