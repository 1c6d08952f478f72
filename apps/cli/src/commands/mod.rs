//! 命令定义和实现

pub mod handshake;
pub mod monitor;
pub mod send;

pub use handshake::HandshakeCommand;
pub use monitor::MonitorCommand;
pub use send::SendCommand;
