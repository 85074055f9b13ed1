mod checkin_handler;
mod device_param_handler;
mod geofence_handler;

pub use checkin_handler::*;
pub use device_param_handler::*;
pub use geofence_handler::*;
