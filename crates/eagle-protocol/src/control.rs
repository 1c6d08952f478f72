//! 上行命令编码
//!
//! 每种命令对应 `EagleCommand` 的一个变体，编码结果为
//! `[` + 标签 + (` ` + 十进制整数参数)* + `\r`。
//!
//! 编码是纯函数且不会失败：参数一律按十进制输出，无千分位、无 `+` 号、无转义。

use crate::constants::{COMMAND_PREFIX, COMMAND_TERMINATOR};
use crate::tags::CommandTag;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 执行器 ID（控制器内部编号，即槽位下标）
pub type ActuatorId = u8;

// ============================================================================
// 参数枚举
// ============================================================================

/// 执行器极性（决定位置增加方向和正向力方向）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Polarity {
    /// 正极性（默认）
    #[default]
    Positive = 0,
    /// 负极性
    Negative = 1,
}

// ============================================================================
// 命令
// ============================================================================

/// Eagle Controller 上行命令
///
/// # 示例
///
/// ```
/// use eagle_protocol::EagleCommand;
///
/// let cmd = EagleCommand::Force { id: 3, force: -50 };
/// assert_eq!(cmd.encode(), "[f 3 -50\r");
///
/// assert_eq!(EagleCommand::Handshake.encode(), "[handshake\r");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EagleCommand {
    /// 力指令（开启位置控制时会被控制器覆盖）
    Force { id: ActuatorId, force: i32 },
    /// 扩展力指令（响应附带温度/电压/功率遥测）
    ExtendedForce { id: ActuatorId, force: i32 },
    /// 休眠（失能）执行器
    Sleep { id: ActuatorId },
    /// 唤醒执行器（上电默认已唤醒）
    Wake { id: ActuatorId },
    /// 设置极性
    Polarity { id: ActuatorId, polarity: Polarity },
    /// 将当前位置设为零点
    ResetPosition { id: ActuatorId },
    /// 位置控制目标（毫米，相对零点）
    PositionControl { id: ActuatorId, target_mm: i32 },
    /// 使能/禁用位置控制器
    EnablePositionControl { id: ActuatorId, enable: bool },
    /// 查询温度
    Temperature { id: ActuatorId },
    /// 清除错误（并非所有控制器都支持）
    ClearErrors { id: ActuatorId },
    /// 查询执行器构建信息和序列号
    Info { id: ActuatorId },
    /// 握手，确认串口连接的是 Eagle 固件
    Handshake,
    /// 通知控制器执行器已回到零位，可以输出力
    SystemReady,
    /// 重新枚举所有执行器（控制器上电时会自动执行）
    Enumerate,
}

impl EagleCommand {
    /// 命令标签
    pub fn tag(&self) -> CommandTag {
        match self {
            EagleCommand::Force { .. } => CommandTag::Force,
            EagleCommand::ExtendedForce { .. } => CommandTag::ExtendedForce,
            EagleCommand::Sleep { .. } => CommandTag::Sleep,
            EagleCommand::Wake { .. } => CommandTag::Wake,
            EagleCommand::Polarity { .. } => CommandTag::Polarity,
            EagleCommand::ResetPosition { .. } => CommandTag::ResetPosition,
            EagleCommand::PositionControl { .. } => CommandTag::PositionControl,
            EagleCommand::EnablePositionControl { .. } => CommandTag::EnablePositionControl,
            EagleCommand::Temperature { .. } => CommandTag::Temperature,
            EagleCommand::ClearErrors { .. } => CommandTag::ClearErrors,
            EagleCommand::Info { .. } => CommandTag::Info,
            EagleCommand::Handshake => CommandTag::Handshake,
            EagleCommand::SystemReady => CommandTag::SystemReady,
            EagleCommand::Enumerate => CommandTag::Enumerate,
        }
    }

    /// 目标执行器 ID（全局命令返回 `None`）
    pub fn actuator_id(&self) -> Option<ActuatorId> {
        match *self {
            EagleCommand::Force { id, .. }
            | EagleCommand::ExtendedForce { id, .. }
            | EagleCommand::Sleep { id }
            | EagleCommand::Wake { id }
            | EagleCommand::Polarity { id, .. }
            | EagleCommand::ResetPosition { id }
            | EagleCommand::PositionControl { id, .. }
            | EagleCommand::EnablePositionControl { id, .. }
            | EagleCommand::Temperature { id }
            | EagleCommand::ClearErrors { id }
            | EagleCommand::Info { id } => Some(id),
            EagleCommand::Handshake | EagleCommand::SystemReady | EagleCommand::Enumerate => None,
        }
    }

    /// 除 ID 外的数值参数
    fn argument(&self) -> Option<i64> {
        match *self {
            EagleCommand::Force { force, .. } | EagleCommand::ExtendedForce { force, .. } => {
                Some(force as i64)
            },
            EagleCommand::Polarity { polarity, .. } => Some(u8::from(polarity) as i64),
            EagleCommand::PositionControl { target_mm, .. } => Some(target_mm as i64),
            EagleCommand::EnablePositionControl { enable, .. } => Some(enable as i64),
            _ => None,
        }
    }

    /// 编码为完整线上字符串（含 `\r` 终止符）
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(16);
        self.encode_into(&mut out);
        out
    }

    /// 追加编码结果到已有缓冲区（热路径复用分配）
    pub fn encode_into(&self, out: &mut String) {
        use std::fmt::Write;
        // 写入 String 不会失败
        let _ = write!(out, "{}", self);
        out.push(COMMAND_TERMINATOR);
    }
}

/// 不含终止符的线上形式（用于日志）
impl fmt::Display for EagleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COMMAND_PREFIX, self.tag())?;
        if let Some(id) = self.actuator_id() {
            write!(f, " {}", id)?;
        }
        if let Some(arg) = self.argument() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
