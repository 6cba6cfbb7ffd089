mod runtime_registry;

pub use runtime_registry::{ID_KEY, RuntimeDeviceRegistry};
