use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 设备连接状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// 未连接（初始状态）
    Disconnected,
    /// 已连接，轮询任务运行中
    Connected,
    /// 错误状态
    Error,
    /// 设备已关机
    SwitchedOff,
}

impl ConnectionState {
    /// 轮询任务在这些状态下退出
    pub fn stops_polling(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Error | ConnectionState::SwitchedOff
        )
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
            ConnectionState::SwitchedOff => write!(f, "switched_off"),
        }
    }
}

impl FromStr for ConnectionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disconnected" => Ok(ConnectionState::Disconnected),
            "connected" => Ok(ConnectionState::Connected),
            "error" => Ok(ConnectionState::Error),
            "switched_off" => Ok(ConnectionState::SwitchedOff),
            other => Err(format!("未知连接状态: {}", other)),
        }
    }
}

/// 设备类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Lamp,
    RgbLamp,
    Window,
    Door,
}

impl DeviceType {
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Lamp,
        DeviceType::RgbLamp,
        DeviceType::Window,
        DeviceType::Door,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Lamp => "lamp",
            DeviceType::RgbLamp => "rgb_lamp",
            DeviceType::Window => "window",
            DeviceType::Door => "door",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.to_ascii_lowercase();
        DeviceType::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| format!("{} is unsupported device_type", s))
    }
}

/// 命令中 `action` 字段的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    Connect,
    Disconnect,
    GetData,
    GetStatus,
    PowerOff,
    Reboot,
    /// 设备主动推送的数据
    Data,
}

impl DeviceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::Connect => "connect",
            DeviceAction::Disconnect => "disconnect",
            DeviceAction::GetData => "get_data",
            DeviceAction::GetStatus => "get_status",
            DeviceAction::PowerOff => "power_off",
            DeviceAction::Reboot => "reboot",
            DeviceAction::Data => "data",
        }
    }

    /// 是否携带需要记录的数据快照
    pub fn carries_data(&self) -> bool {
        matches!(self, DeviceAction::GetData | DeviceAction::Data)
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s.to_ascii_lowercase().as_str() {
            "connect" => DeviceAction::Connect,
            "disconnect" => DeviceAction::Disconnect,
            "get_data" => DeviceAction::GetData,
            "get_status" => DeviceAction::GetStatus,
            "power_off" => DeviceAction::PowerOff,
            "reboot" => DeviceAction::Reboot,
            "data" => DeviceAction::Data,
            other => return Err(format!("未知操作: {}", other)),
        };
        Ok(action)
    }
}
