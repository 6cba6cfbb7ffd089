mod base;
mod factory;
mod kinds;
mod metrics;
mod polling;
mod runtime;

pub use base::{BaseDevice, HOST_KEY, PORT_KEY, UPDATE_TIME_KEY};
pub use factory::{ConnectorBuilder, DEVICE_PROPERTIES_KEY, DEVICE_TYPE_KEY, DeviceFactory, DeviceSpec};
pub use kinds::{DeviceKind, RgbLampKind, StandardKind};
pub use metrics::{DEFAULT_METRICS_CAPACITY, Metric, MetricsHistory};
