//! 设备连接与状态管理
//!
//! - `core`: 结果封装、状态枚举和组件接口
//! - `connector`: 点对点连接器和模拟端点
//! - `device`: 单设备状态机与后台轮询
//! - `pool`: 同类型设备的组合
//! - `registry`: 内存设备注册表

pub mod config;
pub mod connector;
pub mod core;
pub mod device;
pub mod pool;
pub mod registry;

pub use config::{HubConfig, LoggingConfig, PoolConfig};
pub use self::core::state::{ConnectionState, DeviceAction, DeviceType};
pub use self::core::status::{InternalStatus, Properties, Response, StatusCode};
pub use self::core::traits::{Connector, Device, DeviceRegistry, Transport, TransportError};
pub use device::{BaseDevice, DeviceFactory, DeviceSpec};
pub use pool::DevicePool;
pub use registry::RuntimeDeviceRegistry;
