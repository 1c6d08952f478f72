//! Eagle SDK - Eagle 力控执行器控制器 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 命令编码、行重组、响应解析，不涉及 IO
//! - **串口层** (`serial`): 串口抽象，支持真实设备和测试用 Mock
//! - **驱动层** (`driver`): IO 线程管理、执行器状态同步、命令优先级
//!
//! # 快速开始
//!
//! ```no_run
//! use eagle_sdk::prelude::*;
//! use std::time::Duration;
//!
//! eagle_sdk::init_logger();
//!
//! let eagle = EagleBuilder::new().port("/dev/ttyACM0").build()?;
//! eagle.handshake()?;
//! eagle.wait_for_handshake(Duration::from_millis(100))?;
//! eagle.enumerate()?;
//! # Ok::<(), DriverError>(())
//! ```

pub use eagle_driver as driver;
pub use eagle_protocol as protocol;
pub use eagle_serial as serial;

pub mod prelude;

pub use eagle_driver::{
    ActuatorRecord, ActuatorRegistry, DriverConfig, DriverError, Eagle, EagleBuilder,
    PipelineConfig,
};
pub use eagle_protocol::{EagleCommand, ParseFailure, ProtocolEvent, parse_response};
pub use eagle_serial::{SerialAdapter, SerialError};

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static LOGGER: OnceLock<()> = OnceLock::new();

/// 初始化日志（可重复调用，只有第一次生效）
///
/// 级别由 `RUST_LOG` 控制，缺省为 `info`；`log` crate 的记录也会转发到 tracing。
pub fn init_logger() {
    LOGGER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

        // 已有全局 subscriber（如测试框架或宿主程序设置）时保留原有的
        let _ = tracing_log::LogTracer::init();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_idempotent() {
        init_logger();
        init_logger();
        tracing::info!("logger initialised");
    }
}
