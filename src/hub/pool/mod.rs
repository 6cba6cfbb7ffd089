//! 设备池模块

mod device_pool;

pub use device_pool::{ADD_KEY, DEVICES_KEY, DevicePool, METRICS_KEY, REMOVE_KEY, RESPONSES_KEY};
