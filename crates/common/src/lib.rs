pub mod domain;
pub mod garde;
pub mod http;
pub mod telemetry;

pub use domain::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockActionRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockNotificationService;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockServiceQuota;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockUserRepository;
