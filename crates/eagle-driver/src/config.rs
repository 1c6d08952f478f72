//! 驱动配置文件
//!
//! TOML 格式，所有字段均可省略（缺省取默认值）：
//!
//! ```toml
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! actuator_count = 8
//! handshake_timeout_ms = 100
//! dual_thread = true
//! sleep_on_drop = true
//!
//! [pipeline]
//! poll_interval_us = 200
//! max_pending_bytes = 4096
//! connection_timeout_ms = 1000
//! ```

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use eagle_protocol::{DEFAULT_ACTUATOR_COUNT, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// 串口设备路径（命令行 `--port` 优先）
    pub port: Option<String>,
    pub baud_rate: u32,
    /// 执行器槽位数（1..=256）
    pub actuator_count: usize,
    /// 握手应答等待时间（毫秒）
    pub handshake_timeout_ms: u64,
    /// 是否使用 RX/TX 双线程模式
    pub dual_thread: bool,
    /// 析构时是否向已枚举执行器发送休眠命令
    pub sleep_on_drop: bool,
    pub pipeline: PipelineConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            actuator_count: DEFAULT_ACTUATOR_COUNT,
            handshake_timeout_ms: 100,
            dual_thread: true,
            sleep_on_drop: true,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, DriverError> {
        let config: DriverConfig = toml::from_str(text)?;
        if config.actuator_count == 0 || config.actuator_count > 256 {
            return Err(DriverError::InvalidInput(format!(
                "actuator_count must be in 1..=256, got {}",
                config.actuator_count
            )));
        }
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!("Loading driver config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.port, None);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.actuator_count, 8);
        assert_eq!(config.handshake_timeout(), Duration::from_millis(100));
        assert!(config.dual_thread);
        assert!(config.sleep_on_drop);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(DriverConfig::from_toml_str("").unwrap(), DriverConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = DriverConfig::from_toml_str(
            r#"
            port = "/dev/ttyACM0"
            actuator_count = 4

            [pipeline]
            max_pending_bytes = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.actuator_count, 4);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.pipeline.max_pending_bytes, Some(4096));
        assert_eq!(config.pipeline.poll_interval_us, 200);
    }

    #[test]
    fn test_invalid_actuator_count() {
        let err = DriverConfig::from_toml_str("actuator_count = 0").unwrap_err();
        assert!(matches!(err, DriverError::InvalidInput(_)));

        let err = DriverConfig::from_toml_str("actuator_count = 300").unwrap_err();
        assert!(matches!(err, DriverError::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = DriverConfig::from_toml_str("baud_rate = \"fast\"").unwrap_err();
        assert!(matches!(err, DriverError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DriverConfig::load("/nonexistent/eagle.toml").unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
    }
}
