//! 设备类型相关的策略：命令校验

use regex::Regex;
use std::sync::LazyLock;

use crate::hub::connector::COLOR_KEY;
use crate::hub::core::state::DeviceType;
use crate::hub::core::status::{Properties, Response, StatusCode};

static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{6}$").expect("颜色正则是常量"));

/// 注入到 `BaseDevice` 的设备类型策略
pub trait DeviceKind: Send + Sync {
    fn device_type(&self) -> DeviceType;

    /// 校验命令，默认全部通过
    fn validate_command(&self, _command: &Properties) -> Response {
        Response::success()
    }
}

/// 灯、门、窗
pub struct StandardKind {
    device_type: DeviceType,
}

impl StandardKind {
    pub fn new(device_type: DeviceType) -> Self {
        Self { device_type }
    }
}

impl DeviceKind for StandardKind {
    fn device_type(&self) -> DeviceType {
        self.device_type
    }
}

/// RGB 灯：颜色必须是六位十六进制字符串
pub struct RgbLampKind;

impl RgbLampKind {
    fn is_valid_color(color: &str) -> bool {
        COLOR_RE.is_match(color)
    }
}

impl DeviceKind for RgbLampKind {
    fn device_type(&self) -> DeviceType {
        DeviceType::RgbLamp
    }

    fn validate_command(&self, command: &Properties) -> Response {
        match command.get(COLOR_KEY) {
            None => Response::success(),
            Some(value) => match value.as_str() {
                Some(color) if Self::is_valid_color(color) => Response::success(),
                _ => Response::failed(
                    StatusCode::BadRequest,
                    "invalid color, expected six hex digits like FF00AA",
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_standard_accepts_anything() {
        let kind = StandardKind::new(DeviceType::Door);
        assert!(kind.validate_command(&command(json!({ "whatever": [1, 2] }))).is_ok());
    }

    #[test]
    fn test_rgb_color_validation() {
        let kind = RgbLampKind;

        assert!(kind.validate_command(&command(json!({ "color": "00ff7A" }))).is_ok());
        assert!(kind.validate_command(&command(json!({ "state": "on" }))).is_ok());

        let bad = kind.validate_command(&command(json!({ "color": "green" })));
        assert_eq!(bad.code, StatusCode::BadRequest);
        assert!(!kind.validate_command(&command(json!({ "color": 255 }))).is_ok());
        assert!(!kind.validate_command(&command(json!({ "color": "FFFFFFF" }))).is_ok());
    }
}
