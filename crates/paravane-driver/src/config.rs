//! 桥接配置
//!
//! TOML 格式，所有字段都有默认值，空文件即为出厂配置：
//!
//! ```toml
//! n_servos = 4
//! frame_layout = "base"
//! feedback_source = "auxiliary"
//! sink_capacity = 64
//!
//! [udp]
//! peer_ip = "192.168.2.3"
//! send_port = 1560
//! receive_port = 1561
//! receive_buffer_size = 1024
//! receive_timeout_ms = 2
//! ```

use crate::bridge::FeedbackSource;
use paravane_protocol::{COMMANDED_SERVOS, FrameLayout};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// UDP 链路参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UdpConfig {
    /// 本地绑定地址
    pub bind_ip: IpAddr,
    /// 控制器地址
    pub peer_ip: IpAddr,
    /// 指令发往控制器的端口
    pub send_port: u16,
    /// 本地接收遥测的端口
    pub receive_port: u16,
    /// 接收缓冲区（字节），需能容纳一整帧遥测
    pub receive_buffer_size: usize,
    /// 接收超时（毫秒），RX 线程据此检查退出标志
    pub receive_timeout_ms: u64,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            peer_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 2, 3)),
            send_port: 1560,
            receive_port: 1561,
            receive_buffer_size: 1024,
            receive_timeout_ms: 2,
        }
    }
}

impl UdpConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.receive_port)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer_ip, self.send_port)
    }
}

/// 桥接配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub udp: UdpConfig,
    /// 实际安装的舵机数量（1-4），超出部分的指令强制为 0
    pub n_servos: usize,
    /// 遥测帧布局
    pub frame_layout: FrameLayout,
    /// 舵机反馈来源
    pub feedback_source: FeedbackSource,
    /// 下游消息队列容量
    pub sink_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            udp: UdpConfig::default(),
            n_servos: COMMANDED_SERVOS,
            frame_layout: FrameLayout::default(),
            feedback_source: FeedbackSource::default(),
            sink_capacity: 64,
        }
    }
}

impl BridgeConfig {
    /// 解析并校验 TOML 文本
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML（用于导出默认配置）
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let udp = &self.udp;
        if udp.peer_ip.is_unspecified() {
            return Err(ConfigError::invalid(
                "udp.peer_ip",
                "must be a concrete address",
            ));
        }
        if udp.send_port == 0 {
            return Err(ConfigError::invalid("udp.send_port", "must be > 0"));
        }
        if udp.receive_port == 0 {
            return Err(ConfigError::invalid("udp.receive_port", "must be > 0"));
        }
        if udp.receive_buffer_size == 0 {
            return Err(ConfigError::invalid("udp.receive_buffer_size", "must be > 0"));
        }
        let frame_len = self.frame_layout.frame_len();
        // 缓冲区必须严格大于帧长，超长数据报才会以超长长度交给解码器而不是被截断
        if udp.receive_buffer_size <= frame_len {
            return Err(ConfigError::invalid(
                "udp.receive_buffer_size",
                format!(
                    "{} bytes must exceed the {} byte telemetry frame",
                    udp.receive_buffer_size, frame_len
                ),
            ));
        }
        if udp.receive_timeout_ms == 0 {
            return Err(ConfigError::invalid("udp.receive_timeout_ms", "must be > 0"));
        }
        if !(1..=COMMANDED_SERVOS).contains(&self.n_servos) {
            return Err(ConfigError::invalid(
                "n_servos",
                format!("must be in 1..={}, got {}", COMMANDED_SERVOS, self.n_servos),
            ));
        }
        if self.sink_capacity == 0 {
            return Err(ConfigError::invalid("sink_capacity", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(
            config.udp.peer_addr(),
            "192.168.2.3:1560".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.udp.bind_addr().port(), 1561);
        assert_eq!(config.udp.receive_buffer_size, 1024);
        assert_eq!(config.frame_layout, FrameLayout::Base);
        assert_eq!(config.feedback_source, FeedbackSource::Auxiliary);
    }

    #[test]
    fn test_partial_override() {
        let config = BridgeConfig::from_toml_str(
            r#"
            frame_layout = "extended"
            feedback_source = "external"
            n_servos = 2

            [udp]
            peer_ip = "10.0.0.7"
            send_port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.frame_layout, FrameLayout::Extended);
        assert_eq!(config.feedback_source, FeedbackSource::External);
        assert_eq!(config.n_servos, 2);
        assert_eq!(config.udp.peer_addr().to_string(), "10.0.0.7:9000");
        assert_eq!(config.udp.receive_port, 1561);
    }

    #[test]
    fn test_unparseable_peer_ip_rejected() {
        let err = BridgeConfig::from_toml_str("[udp]\npeer_ip = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = BridgeConfig::from_toml_str("teensy = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: [(&str, fn(&mut BridgeConfig)); 10] = [
            ("udp.receive_buffer_size", |c| c.udp.receive_buffer_size = 0),
            ("udp.receive_buffer_size", |c| {
                c.frame_layout = FrameLayout::Extended;
                c.udp.receive_buffer_size = 52;
            }),
            ("udp.receive_buffer_size", |c| c.udp.receive_buffer_size = 52),
            ("udp.receive_buffer_size", |c| {
                c.frame_layout = FrameLayout::Extended;
                c.udp.receive_buffer_size = 72;
            }),
            ("n_servos", |c| c.n_servos = 0),
            ("n_servos", |c| c.n_servos = 5),
            ("udp.send_port", |c| c.udp.send_port = 0),
            ("udp.receive_timeout_ms", |c| c.udp.receive_timeout_ms = 0),
            ("udp.peer_ip", |c| c.udp.peer_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            ("sink_capacity", |c| c.sink_capacity = 0),
        ];
        for (expected_field, mutate) in cases {
            let mut config = BridgeConfig::default();
            mutate(&mut config);
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("expected {} to be rejected, got {:?}", expected_field, other),
            }
        }
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = BridgeConfig::default().to_toml_string().unwrap();
        assert!(text.contains("receive_port = 1561"), "{}", text);
        assert_eq!(
            BridgeConfig::from_toml_str(&text).unwrap(),
            BridgeConfig::default()
        );
    }
}
