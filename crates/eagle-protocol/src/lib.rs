//! # Eagle Protocol
//!
//! Eagle 执行器控制器串口行协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量定义
//! - `tags`: 命令/响应标签
//! - `control`: 上行命令编码
//! - `feedback`: 下行响应解析
//! - `framing`: 字节流 → 行重组
//!
//! ## 线上格式
//!
//! ```text
//! 主机 → 控制器:  [<tag> <id> <arg>\r
//! 控制器 → 主机:  ]<tag> <field> <field> ...\n
//! ```
//!
//! 所有数值为 ASCII 十进制，字段以单个空格分隔。

pub mod constants;
pub mod control;
pub mod feedback;
pub mod framing;
pub mod tags;

// 重新导出常用类型
pub use constants::*;
pub use control::{ActuatorId, EagleCommand, Polarity};
pub use feedback::{
    ExtendedFeedback, MotionFeedback, ParseErrorKind, ParseFailure, ProtocolEvent, RawActuatorId,
    parse_response,
};
pub use framing::LineReassembler;
pub use tags::{CommandTag, ResponseTag};

#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn test_event_json_roundtrip() {
        let event = parse_response("]f 2 -30 4500").unwrap();
        let json = serde_json::to_string(&event).unwrap();
        let back: ProtocolEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_command_serializes() {
        let cmd = EagleCommand::Sleep { id: 1 };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("Sleep"));
    }
}
