//! 驱动层错误类型定义

use eagle_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令通道已满（缓冲区容量 10）
    #[error("Command channel full (buffer size: 10)")]
    ChannelFull,

    /// 未使用双线程模式
    ///
    /// `send_realtime()` 等方法只能在双线程模式下使用。
    #[error("Not in dual-thread mode. Use `EagleBuilder::dual_thread(true)`")]
    NotDualThread,

    /// 操作超时（如握手未在规定时间内应答）
    #[error("Operation timeout")]
    Timeout,

    /// 无效输入（如空命令包、零容量注册表）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 配置文件格式错误
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// 配置文件读取错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use eagle_serial::SerialError;

    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::Serial(SerialError::NotOpen);
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Serial") && msg.contains("Port not open"), "{}", msg);

        assert_eq!(
            format!("{}", DriverError::ChannelClosed),
            "Command channel closed"
        );

        let msg = format!("{}", DriverError::ChannelFull);
        assert!(msg.contains("channel full"));

        assert_eq!(format!("{}", DriverError::Timeout), "Operation timeout");

        let msg = format!("{}", DriverError::InvalidInput("capacity".to_string()));
        assert!(msg.contains("Invalid input") && msg.contains("capacity"));
    }

    #[test]
    fn test_from_serial_error() {
        let driver_error: DriverError = SerialError::Timeout.into();
        match driver_error {
            DriverError::Serial(e) => assert!(matches!(e, SerialError::Timeout)),
            _ => panic!("Expected Serial variant"),
        }
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<toml::Table>("port = ").unwrap_err();
        let driver_error: DriverError = err.into();
        assert!(matches!(driver_error, DriverError::Config(_)));
    }
}
