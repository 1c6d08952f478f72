//! 测试替身：脚本化的串口
//!
//! `MockSerialAdapter` 与 `MockSerialHandle` 共享同一条内存链路：
//! 测试线程通过 handle 注入下行数据、检查上行字节、注入故障，
//! 驱动线程持有 adapter（或拆分后的半边）正常收发。

use crate::{RxAdapter, SerialAdapter, SerialError, SplittableAdapter, TxAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// 可注入的故障类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 超时（非致命）
    Timeout,
    /// 一般 IO 错误（非致命）
    Io,
    /// 设备断开（致命）
    Disconnected,
}

impl MockFailure {
    fn to_error(self) -> SerialError {
        match self {
            MockFailure::Timeout => SerialError::Timeout,
            MockFailure::Io => SerialError::Io(io::Error::other("injected mock failure")),
            MockFailure::Disconnected => SerialError::Disconnected,
        }
    }
}

/// 收到上行命令后自动生成下行数据（模拟控制器应答）
type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

#[derive(Default)]
struct MockLink {
    open: bool,
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<u8>,
    read_failure: Option<MockFailure>,
    write_failure: Option<MockFailure>,
    responder: Option<Responder>,
}

impl MockLink {
    fn read(&mut self) -> Result<Vec<u8>, SerialError> {
        if !self.open {
            return Err(SerialError::NotOpen);
        }
        if let Some(failure) = self.read_failure {
            return Err(failure.to_error());
        }
        Ok(self.inbound.pop_front().unwrap_or_default())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if !self.open {
            return Err(SerialError::NotOpen);
        }
        if let Some(failure) = self.write_failure {
            return Err(failure.to_error());
        }
        self.outbound.extend_from_slice(bytes);

        if let Some(responder) = self.responder.as_mut() {
            let text = String::from_utf8_lossy(bytes);
            for command in text.split('\r').filter(|c| !c.is_empty()) {
                if let Some(reply) = responder(command) {
                    self.inbound.push_back(reply.into_bytes());
                }
            }
        }
        Ok(())
    }
}

/// 脚本化串口适配器
pub struct MockSerialAdapter {
    link: Arc<Mutex<MockLink>>,
}

/// 测试侧句柄（可克隆，跨线程共享）
#[derive(Clone)]
pub struct MockSerialHandle {
    link: Arc<Mutex<MockLink>>,
}

impl MockSerialAdapter {
    /// 创建一对 adapter/handle（端口初始为关闭状态）
    pub fn new() -> (Self, MockSerialHandle) {
        let link = Arc::new(Mutex::new(MockLink::default()));
        (
            Self { link: link.clone() },
            MockSerialHandle { link },
        )
    }
}

impl MockSerialHandle {
    /// 注入一个下行分块（原样交付，一次 `read_available` 取走一个分块）
    pub fn push_inbound(&self, chunk: impl Into<Vec<u8>>) {
        self.link.lock().inbound.push_back(chunk.into());
    }

    /// 注入一行下行数据（自动追加 `\r\n`）
    pub fn push_line(&self, line: &str) {
        self.push_inbound(format!("{}\r\n", line));
    }

    /// 已写出的全部上行字节
    pub fn written(&self) -> Vec<u8> {
        self.link.lock().outbound.clone()
    }

    /// 已写出的上行命令（按 `\r` 切分，不含终止符）
    pub fn written_commands(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.link.lock().outbound)
            .split('\r')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 清空上行记录
    pub fn clear_written(&self) {
        self.link.lock().outbound.clear();
    }

    pub fn pending_inbound(&self) -> usize {
        self.link.lock().inbound.len()
    }

    pub fn set_read_failure(&self, failure: Option<MockFailure>) {
        self.link.lock().read_failure = failure;
    }

    pub fn set_write_failure(&self, failure: Option<MockFailure>) {
        self.link.lock().write_failure = failure;
    }

    /// 设置应答器：每条写出的命令（不含 `\r`）调用一次，返回值作为下行分块入队
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        self.link.lock().responder = Some(Box::new(responder));
    }

    pub fn is_open(&self) -> bool {
        self.link.lock().open
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn open(&mut self) -> Result<(), SerialError> {
        self.link.lock().open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.link.lock().open
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        self.link.lock().read()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.link.lock().write(bytes)
    }

    fn close(&mut self) {
        self.link.lock().open = false;
    }
}

pub struct MockRxAdapter {
    link: Arc<Mutex<MockLink>>,
}

pub struct MockTxAdapter {
    link: Arc<Mutex<MockLink>>,
}

impl RxAdapter for MockRxAdapter {
    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        self.link.lock().read()
    }
}

impl TxAdapter for MockTxAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.link.lock().write(bytes)
    }
}

impl SplittableAdapter for MockSerialAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError> {
        if !self.link.lock().open {
            return Err(SerialError::NotOpen);
        }
        Ok((
            MockRxAdapter {
                link: self.link.clone(),
            },
            MockTxAdapter { link: self.link },
        ))
    }
}
