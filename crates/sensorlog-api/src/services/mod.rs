// Services layer for business logic
// Services own query normalization and not-found handling, calling the store directly

pub mod device;
pub mod event;

pub use device::DeviceService;
pub use event::EventService;
