//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use eagle_sdk::prelude::*;
//! ```

// 驱动层
pub use eagle_driver::{
    ActuatorRecord, ApplyOutcome, CommandPriority, DriverCommand, DriverConfig, Eagle,
    EagleBuilder, MetricsSnapshot, PipelineConfig, RegistrySnapshot,
};

// 协议层
pub use eagle_protocol::{ActuatorId, EagleCommand, Polarity, ProtocolEvent};

// 串口层（常用 Trait）
pub use eagle_serial::{SerialAdapter, SplittableAdapter};

// 错误类型
pub use eagle_driver::DriverError;
pub use eagle_protocol::ParseFailure;
pub use eagle_serial::SerialError;
