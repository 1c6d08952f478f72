//! # Eagle Serial Adapter Layer
//!
//! 串口传输抽象层：驱动层只依赖 `SerialAdapter` / `RxAdapter` / `TxAdapter`，
//! 不关心底层是真实串口还是测试替身。
//!
//! 传输层只搬运字节：不添加分隔符（命令的 `\r` 由编码器负责），
//! 也不做行切分（由 `LineReassembler` 负责）。

use std::io;
use thiserror::Error;

pub mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use port::{SerialPortAdapter, SerialPortRxAdapter, SerialPortTxAdapter};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockFailure, MockSerialAdapter, MockSerialHandle};

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Port not open")]
    NotOpen,
    #[error("Operation timed out")]
    Timeout,
    #[error("Device disconnected")]
    Disconnected,
}

impl SerialError {
    /// 是否为不可恢复错误（设备已拔出、端口未打开等）
    ///
    /// 非致命错误在接收循环中视为"本周期无数据"。
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::NotOpen | SerialError::Disconnected => true,
            SerialError::Timeout => false,
            SerialError::Port(e) => matches!(e.kind(), serialport::ErrorKind::NoDevice),
            SerialError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::PermissionDenied
            ),
        }
    }
}

/// 字节级串口通道
///
/// `read_available` 是非阻塞的：没有待读数据时返回空 `Vec`，
/// 读超时同样映射为空结果而不是错误。
pub trait SerialAdapter {
    /// 打开端口（已打开时为无操作）
    fn open(&mut self) -> Result<(), SerialError>;

    fn is_open(&self) -> bool;

    /// 读取当前所有可用字节
    fn read_available(&mut self) -> Result<Vec<u8>, SerialError>;

    /// 写出完整字节序列
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 关闭端口（未打开时为无操作）
    fn close(&mut self);
}

/// 只读半边（接收线程持有）
pub trait RxAdapter {
    fn read_available(&mut self) -> Result<Vec<u8>, SerialError>;
}

/// 只写半边（发送线程持有）
pub trait TxAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

/// 可拆分为独立收发半边的适配器（双线程模式）
pub trait SplittableAdapter: SerialAdapter {
    type RxAdapter: RxAdapter;
    type TxAdapter: TxAdapter;

    /// 拆分前端口必须已打开
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SerialError::NotOpen.is_fatal());
        assert!(SerialError::Disconnected.is_fatal());
        assert!(!SerialError::Timeout.is_fatal());

        let io_err = SerialError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(io_err.is_fatal());
        let io_err = SerialError::from(io::Error::from(io::ErrorKind::Interrupted));
        assert!(!io_err.is_fatal());

        let port_err = SerialError::from(serialport::Error::new(
            serialport::ErrorKind::NoDevice,
            "unplugged",
        ));
        assert!(port_err.is_fatal());
        let port_err = SerialError::from(serialport::Error::new(
            serialport::ErrorKind::InvalidInput,
            "bad baud",
        ));
        assert!(!port_err.is_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SerialError::NotOpen.to_string(), "Port not open");
        assert_eq!(SerialError::Timeout.to_string(), "Operation timed out");
    }
}
