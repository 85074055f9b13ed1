mod action;
mod device;
mod event;
mod geo;
mod in_memory_platform;
mod key_value;
mod notification;
mod result;
mod usage;
mod user;

pub use action::*;
pub use device::*;
pub use event::*;
pub use geo::*;
pub use in_memory_platform::*;
pub use key_value::*;
pub use notification::*;
pub use result::*;
pub use usage::*;
pub use user::*;
