//! Builder 模式实现
//!
//! 提供链式构造 `Eagle` 实例的便捷方式。

use crate::config::DriverConfig;
use crate::eagle::Eagle;
use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use eagle_protocol::{DEFAULT_ACTUATOR_COUNT, DEFAULT_BAUD_RATE};
use eagle_serial::{SerialPortAdapter, SplittableAdapter};
use std::time::Duration;
use tracing::info;

/// Eagle Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use eagle_driver::{EagleBuilder, PipelineConfig};
///
/// // 使用默认配置
/// let eagle = EagleBuilder::new().port("/dev/ttyACM0").build()?;
///
/// // 自定义槽位数和 Pipeline 配置
/// let config = PipelineConfig {
///     max_pending_bytes: Some(4096),
///     ..Default::default()
/// };
/// let eagle = EagleBuilder::new()
///     .port("/dev/ttyACM0")
///     .actuator_count(4)
///     .pipeline_config(config)
///     .build()?;
/// # Ok::<(), eagle_driver::DriverError>(())
/// ```
pub struct EagleBuilder {
    /// 串口设备路径
    port: Option<String>,
    baud_rate: Option<u32>,
    actuator_count: usize,
    pipeline_config: Option<PipelineConfig>,
    dual_thread: bool,
    sleep_on_drop: bool,
    handshake_timeout: Duration,
}

impl EagleBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: None,
            actuator_count: DEFAULT_ACTUATOR_COUNT,
            pipeline_config: None,
            dual_thread: true,
            sleep_on_drop: true,
            handshake_timeout: Duration::from_millis(100),
        }
    }

    /// 从配置文件内容构造
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            port: config.port.clone(),
            baud_rate: Some(config.baud_rate),
            actuator_count: config.actuator_count,
            pipeline_config: Some(config.pipeline.clone()),
            dual_thread: config.dual_thread,
            sleep_on_drop: config.sleep_on_drop,
            handshake_timeout: config.handshake_timeout(),
        }
    }

    /// 设置串口设备路径（如 "/dev/ttyACM0" 或 "COM3"）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    /// 设置执行器槽位数（1..=256，默认 8）
    pub fn actuator_count(mut self, count: usize) -> Self {
        self.actuator_count = count;
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = Some(config);
        self
    }

    /// 是否使用双线程模式（默认 `true`）
    ///
    /// 单线程模式下不支持实时命令。
    pub fn dual_thread(mut self, enabled: bool) -> Self {
        self.dual_thread = enabled;
        self
    }

    /// 析构时是否休眠所有已枚举执行器（默认 `true`）
    pub fn sleep_on_drop(mut self, enabled: bool) -> Self {
        self.sleep_on_drop = enabled;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// 打开串口并启动驱动
    ///
    /// # 错误
    /// - `DriverError::InvalidInput`: 未设置串口路径
    /// - `DriverError::Serial`: 串口打开失败
    pub fn build(self) -> Result<Eagle, DriverError> {
        let port = self
            .port
            .clone()
            .ok_or_else(|| DriverError::InvalidInput("serial port path not set".to_string()))?;
        let baud_rate = self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);

        let adapter = SerialPortAdapter::new(&port).with_baud_rate(baud_rate);
        info!("Opening Eagle controller on {} @ {} baud", port, baud_rate);
        self.build_with(adapter)
    }

    /// 使用给定的适配器启动驱动（未打开时自动打开）
    pub fn build_with<C>(self, adapter: C) -> Result<Eagle, DriverError>
    where
        C: SplittableAdapter + Send + 'static,
        C::RxAdapter: Send + 'static,
        C::TxAdapter: Send + 'static,
    {
        let eagle = if self.dual_thread {
            Eagle::new_dual_thread(adapter, self.actuator_count, self.pipeline_config)?
        } else {
            Eagle::new(adapter, self.actuator_count, self.pipeline_config)?
        };

        Ok(eagle
            .with_metadata(
                self.port.unwrap_or_else(|| "unknown".to_string()),
                self.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            )
            .with_sleep_on_drop(self.sleep_on_drop)
            .with_handshake_timeout(self.handshake_timeout))
    }
}

impl Default for EagleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eagle_serial::MockSerialAdapter;

    #[test]
    fn test_eagle_builder_new() {
        let builder = EagleBuilder::new();
        assert_eq!(builder.port, None);
        assert_eq!(builder.baud_rate, None);
        assert_eq!(builder.actuator_count, 8);
        assert!(builder.pipeline_config.is_none());
        assert!(builder.dual_thread);
        assert!(builder.sleep_on_drop);
    }

    #[test]
    fn test_eagle_builder_chain() {
        let builder = EagleBuilder::new()
            .port("/dev/ttyACM0")
            .baud_rate(57_600)
            .actuator_count(4)
            .dual_thread(false)
            .sleep_on_drop(false);

        assert_eq!(builder.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(builder.baud_rate, Some(57_600));
        assert_eq!(builder.actuator_count, 4);
        assert!(!builder.dual_thread);
        assert!(!builder.sleep_on_drop);
    }

    #[test]
    fn test_eagle_builder_port_chaining() {
        let builder = EagleBuilder::new().port("/dev/ttyACM0").port("/dev/ttyUSB1");
        assert_eq!(builder.port.as_deref(), Some("/dev/ttyUSB1"));
    }

    #[test]
    fn test_eagle_builder_from_config() {
        let config = DriverConfig {
            port: Some("COM3".to_string()),
            actuator_count: 2,
            handshake_timeout_ms: 250,
            dual_thread: false,
            ..Default::default()
        };
        let builder = EagleBuilder::from_config(&config);
        assert_eq!(builder.port.as_deref(), Some("COM3"));
        assert_eq!(builder.baud_rate, Some(115_200));
        assert_eq!(builder.actuator_count, 2);
        assert_eq!(builder.handshake_timeout, Duration::from_millis(250));
        assert!(!builder.dual_thread);
        assert_eq!(builder.pipeline_config, Some(PipelineConfig::default()));
    }

    #[test]
    fn test_build_without_port() {
        let err = EagleBuilder::new().build().err().unwrap();
        assert!(matches!(err, DriverError::InvalidInput(_)));
    }

    #[test]
    fn test_build_missing_device() {
        let result = EagleBuilder::new().port("/dev/eagle-does-not-exist").build();
        assert!(matches!(result, Err(DriverError::Serial(_))));
    }

    #[test]
    fn test_build_with_mock() {
        let (adapter, handle) = MockSerialAdapter::new();
        handle.set_responder(|cmd| (cmd == "[handshake").then(|| "]response\r\n".to_string()));

        let eagle = EagleBuilder::new()
            .port("mock")
            .actuator_count(3)
            .handshake_timeout(Duration::from_secs(2))
            .build_with(adapter)
            .unwrap();

        assert!(eagle.is_dual_thread());
        assert_eq!(eagle.port_name(), "mock");
        assert_eq!(eagle.baud_rate(), 115_200);
        assert_eq!(eagle.capacity(), 3);
        eagle.confirm_port().unwrap();
    }

    #[test]
    fn test_build_with_invalid_capacity() {
        let (adapter, _handle) = MockSerialAdapter::new();
        let result = EagleBuilder::new().actuator_count(0).build_with(adapter);
        assert!(matches!(result, Err(DriverError::InvalidInput(_))));
    }
}
