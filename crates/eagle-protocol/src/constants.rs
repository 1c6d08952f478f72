//! 协议常量定义
//!
//! Eagle Controller 串口协议中使用的所有常量（分隔符、前缀、默认槽位数、单位换算）。

/// 默认执行器槽位数（ID 范围 0..8）
pub const DEFAULT_ACTUATOR_COUNT: usize = 8;

/// 上行命令前缀（主机 → 控制器）
pub const COMMAND_PREFIX: char = '[';

/// 下行响应前缀（控制器 → 主机）
pub const RESPONSE_PREFIX: char = ']';

/// 命令终止符
///
/// 由编码器负责追加，传输层不再添加任何分隔符。
pub const COMMAND_TERMINATOR: char = '\r';

/// 响应行分隔符（唯一的帧边界）
pub const LINE_DELIMITER: u8 = b'\n';

/// 扩展力反馈中电压字段的缩放系数（毫伏 → 伏）
pub const MILLIVOLTS_PER_VOLT: f32 = 1000.0;

/// 默认串口波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
