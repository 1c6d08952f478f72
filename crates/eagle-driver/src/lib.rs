//! 驱动层模块
//!
//! 本模块提供 Eagle 控制器的设备驱动功能，包括：
//! - IO 线程管理（单线程/双线程模式）
//! - 执行器状态同步（一把 `RwLock` 保护整张状态表）
//! - 行重组与响应解析
//! - 命令优先级管理（实时邮箱 + 可靠队列）
//!
//! # 使用场景
//!
//! 适用于需要直接下发协议命令、轮询执行器状态的场景。
//! 大多数用户应该通过 `eagle-sdk` 的 prelude 使用本模块。

mod builder;
pub mod command;
mod config;
mod eagle;
mod error;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
pub mod state;

pub use builder::EagleBuilder;
pub use command::{CommandPriority, DriverCommand, RealtimeCommand};
pub use config::DriverConfig;
pub use eagle::Eagle;
pub use error::DriverError;
pub use heartbeat::ConnectionMonitor;
pub use metrics::{EagleMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, ReceiveState, io_loop, process_chunk, rx_loop, tx_loop_mailbox};
pub use state::*;
