//! 基于 `serialport` 的真实串口适配器
//!
//! 打开端口后拉高 DTR（控制器固件依赖 DTR 判断主机在线），
//! 并丢弃打开前积压在输入缓冲区里的旧数据。

use crate::{RxAdapter, SerialAdapter, SerialError, SplittableAdapter, TxAdapter};
use eagle_protocol::DEFAULT_BAUD_RATE;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 默认读写超时
///
/// 读取前先查询 `bytes_to_read()`，正常情况下不会阻塞到超时。
const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(10);

pub struct SerialPortAdapter {
    path: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortAdapter {
    /// 创建适配器（不会立即打开端口）
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_PORT_TIMEOUT,
            port: None,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 创建并立即打开
    pub fn open_new(path: impl Into<String>, baud_rate: u32) -> Result<Self, SerialError> {
        let mut adapter = Self::new(path).with_baud_rate(baud_rate);
        adapter.open()?;
        Ok(adapter)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl std::fmt::Debug for SerialPortAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortAdapter")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

// ============================================================================
// 收发实现（整端口与拆分后的半边共用）
// ============================================================================

fn read_pending(port: &mut dyn SerialPort) -> Result<Vec<u8>, SerialError> {
    let pending = port.bytes_to_read()? as usize;
    if pending == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; pending];
    match port.read(&mut buf) {
        Ok(n) => {
            buf.truncate(n);
            trace!("serial read {} bytes", n);
            Ok(buf)
        },
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_all(port: &mut dyn SerialPort, bytes: &[u8]) -> Result<(), SerialError> {
    match port.write_all(bytes) {
        Ok(()) => {
            trace!("serial wrote {} bytes", bytes.len());
            Ok(())
        },
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Err(SerialError::Timeout),
        Err(e) => Err(e.into()),
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn open(&mut self) -> Result<(), SerialError> {
        if self.port.is_some() {
            return Ok(());
        }

        let mut port = serialport::new(&self.path, self.baud_rate)
            .timeout(self.timeout)
            .open()?;

        port.write_data_terminal_ready(true)?;
        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!("Failed to clear input buffer on {}: {}", self.path, e);
        }

        debug!("Serial port '{}' opened at {} baud", self.path, self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;
        read_pending(port.as_mut())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;
        write_all(port.as_mut(), bytes)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Serial port '{}' closed", self.path);
        }
    }
}

// ============================================================================
// 拆分
// ============================================================================

/// 接收半边（`try_clone` 得到的独立句柄）
pub struct SerialPortRxAdapter {
    port: Box<dyn SerialPort>,
}

/// 发送半边
pub struct SerialPortTxAdapter {
    port: Box<dyn SerialPort>,
}

impl RxAdapter for SerialPortRxAdapter {
    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        read_pending(self.port.as_mut())
    }
}

impl TxAdapter for SerialPortTxAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write_all(self.port.as_mut(), bytes)
    }
}

impl SplittableAdapter for SerialPortAdapter {
    type RxAdapter = SerialPortRxAdapter;
    type TxAdapter = SerialPortTxAdapter;

    fn split(mut self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError> {
        let tx = self.port.take().ok_or(SerialError::NotOpen)?;
        let rx = tx.try_clone()?;
        debug!("Serial port '{}' split into RX/TX halves", self.path);
        Ok((SerialPortRxAdapter { port: rx }, SerialPortTxAdapter { port: tx }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_closed() {
        let adapter = SerialPortAdapter::new("/dev/ttyACM0");
        assert!(!adapter.is_open());
        assert_eq!(adapter.baud_rate(), DEFAULT_BAUD_RATE);
        assert_eq!(adapter.path(), "/dev/ttyACM0");
    }

    #[test]
    fn test_io_requires_open() {
        let mut adapter = SerialPortAdapter::new("/dev/ttyACM0").with_baud_rate(9600);
        assert!(matches!(adapter.read_available(), Err(SerialError::NotOpen)));
        assert!(matches!(adapter.write(b"[handshake\r"), Err(SerialError::NotOpen)));
        // 未打开时关闭是无操作
        adapter.close();
    }

    #[test]
    fn test_split_requires_open() {
        let adapter = SerialPortAdapter::new("/dev/ttyACM0");
        assert!(matches!(adapter.split(), Err(SerialError::NotOpen)));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut adapter = SerialPortAdapter::new("/dev/eagle-does-not-exist");
        assert!(adapter.open().is_err());
        assert!(!adapter.is_open());
    }
}
