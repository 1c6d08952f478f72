//! 命令标签定义
//!
//! 上行命令和下行响应的标签都是封闭枚举，解析时一次 `match` 完成分发，
//! 未识别的标签落入 `Unknown` 分支而不是被静默忽略。

use std::fmt;

/// 上行命令标签（不含 `[` 前缀）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandTag {
    Force,
    ExtendedForce,
    Sleep,
    Wake,
    Polarity,
    ResetPosition,
    PositionControl,
    EnablePositionControl,
    Temperature,
    ClearErrors,
    Info,
    Handshake,
    SystemReady,
    Enumerate,
}

impl CommandTag {
    /// 线上标签文本
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandTag::Force => "f",
            CommandTag::ExtendedForce => "exf",
            CommandTag::Sleep => "sleep",
            CommandTag::Wake => "wake",
            CommandTag::Polarity => "pol",
            CommandTag::ResetPosition => "rp",
            CommandTag::PositionControl => "pc",
            CommandTag::EnablePositionControl => "pcen",
            CommandTag::Temperature => "t",
            CommandTag::ClearErrors => "ce",
            CommandTag::Info => "info",
            CommandTag::Handshake => "handshake",
            CommandTag::SystemReady => "ready",
            CommandTag::Enumerate => "init",
        }
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 下行响应标签（含 `]` 前缀）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResponseTag {
    Handshake,
    Force,
    PositionControl,
    ExtendedForce,
    Sleep,
    Wake,
    ResetPosition,
    ClearErrors,
    Polarity,
    Temperature,
    State,
    Info,
    InvalidActuator,
    InvalidArgument,
    InitList,
}

impl ResponseTag {
    /// 线上标签文本（含 `]` 前缀）
    pub const fn as_str(self) -> &'static str {
        match self {
            ResponseTag::Handshake => "]response",
            ResponseTag::Force => "]f",
            ResponseTag::PositionControl => "]pc",
            ResponseTag::ExtendedForce => "]exf",
            ResponseTag::Sleep => "]sleep",
            ResponseTag::Wake => "]wake",
            ResponseTag::ResetPosition => "]rp",
            ResponseTag::ClearErrors => "]ce",
            ResponseTag::Polarity => "]pol",
            ResponseTag::Temperature => "]t",
            ResponseTag::State => "]state",
            ResponseTag::Info => "]info",
            ResponseTag::InvalidActuator => "]invalid_act",
            ResponseTag::InvalidArgument => "]invalid_arg",
            ResponseTag::InitList => "]init",
        }
    }

    /// 精确匹配线上标签，未识别返回 `None`
    pub fn from_wire(tag: &str) -> Option<Self> {
        let tag = match tag {
            "]response" => ResponseTag::Handshake,
            "]f" => ResponseTag::Force,
            "]pc" => ResponseTag::PositionControl,
            "]exf" => ResponseTag::ExtendedForce,
            "]sleep" => ResponseTag::Sleep,
            "]wake" => ResponseTag::Wake,
            "]rp" => ResponseTag::ResetPosition,
            "]ce" => ResponseTag::ClearErrors,
            "]pol" => ResponseTag::Polarity,
            "]t" => ResponseTag::Temperature,
            "]state" => ResponseTag::State,
            "]info" => ResponseTag::Info,
            "]invalid_act" => ResponseTag::InvalidActuator,
            "]invalid_arg" => ResponseTag::InvalidArgument,
            "]init" => ResponseTag::InitList,
            _ => return None,
        };
        Some(tag)
    }
}

impl fmt::Display for ResponseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
