//! 下行响应解析
//!
//! 一行响应按空白切分为若干 token，token[0] 为带 `]` 前缀的标签，
//! 其余为按标签约定的字段。字段缺失或数值非法时整行解析为 [`ParseFailure`]，
//! 不会产生部分结果，也不会 panic。

use crate::constants::{MILLIVOLTS_PER_VOLT, RESPONSE_PREFIX};
use crate::tags::ResponseTag;
use std::str::{FromStr, SplitWhitespace};
use thiserror::Error;

/// 响应中的原始执行器 ID
///
/// 解析层不做范围检查（范围取决于注册表容量），因此使用宽整数，
/// 越界 ID 交由注册表拒绝。
pub type RawActuatorId = i64;

// ============================================================================
// 解析错误
// ============================================================================

/// 解析失败的具体原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// 空行（或仅含空白）
    #[error("empty line")]
    EmptyLine,

    /// 标签不以 `]` 开头
    #[error("tag {tag:?} lacks the ']' response prefix")]
    MissingPrefix { tag: String },

    /// 字段数量不足
    #[error("{tag}: missing field `{field}`")]
    MissingField {
        tag: ResponseTag,
        field: &'static str,
    },

    /// 数值字段无法按期望类型解析
    #[error("{tag}: invalid {field} {token:?}")]
    InvalidNumber {
        tag: ResponseTag,
        field: &'static str,
        token: String,
    },
}

/// 行解析失败（携带原始行，便于上报和日志）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (line: {line:?})")]
pub struct ParseFailure {
    /// 原始行（未裁剪）
    pub line: String,
    /// 失败原因
    pub kind: ParseErrorKind,
}

impl ParseFailure {
    fn new(line: &str, kind: ParseErrorKind) -> Self {
        Self {
            line: line.to_string(),
            kind,
        }
    }
}

// ============================================================================
// 响应事件
// ============================================================================

/// 力/位置快照（`]f` 与 `]pc` 共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionFeedback {
    pub id: RawActuatorId,
    pub force: i32,
    /// 位置（微米，长时间运行可能超出 32 位范围）
    pub position: i64,
}

/// 扩展力反馈（`]exf`）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtendedFeedback {
    pub id: RawActuatorId,
    pub force: i32,
    /// 位置（微米）
    pub position: i64,
    /// 错误标志位
    pub errors: i32,
    /// 温度（°C）
    pub temperature: f32,
    /// 电压（V，线上为毫伏）
    pub voltage: f32,
    /// 功率
    pub power: f32,
}

/// 控制器下行事件
///
/// 每个变体只携带该标签相关的字段。解析失败不在此枚举中，
/// 由 [`ParseFailure`] 表示。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolEvent {
    /// 握手应答（`]response`），确认串口连接正确
    Handshake,
    /// 力/位置快照
    Force(MotionFeedback),
    /// 位置控制回显，字段同 `Force`
    PositionControl(MotionFeedback),
    /// 扩展力快照
    ExtendedForce(ExtendedFeedback),
    /// 休眠应答（仅存活确认）
    Sleep { id: RawActuatorId },
    /// 唤醒应答（仅存活确认）
    Wake { id: RawActuatorId },
    /// 位置清零应答（仅存活确认）
    ResetPosition { id: RawActuatorId },
    /// 清错应答（仅存活确认）
    ClearErrors { id: RawActuatorId },
    /// 极性应答
    Polarity { id: RawActuatorId, polarity: i32 },
    /// 温度应答
    Temperature { id: RawActuatorId, temperature: f32 },
    /// 状态应答
    State { id: RawActuatorId, state: i32 },
    /// 执行器信息（token 2.. 以换行拼接）
    Info { id: RawActuatorId, text: String },
    /// 目标执行器未枚举
    ///
    /// `target` 为原始 token；`id` 仅在其为合法整数时存在。
    InvalidActuator {
        target: String,
        id: Option<RawActuatorId>,
    },
    /// 命令参数非法
    InvalidArgument { command: String, value: String },
    /// 枚举结果：在线执行器 ID 列表
    InitList { ids: Vec<RawActuatorId> },
    /// 未识别的标签（带 `]` 前缀）
    Unknown { tag: String },
}

impl ProtocolEvent {
    /// 事件对应的响应标签（`Unknown` 返回 `None`）
    pub fn tag(&self) -> Option<ResponseTag> {
        let tag = match self {
            ProtocolEvent::Handshake => ResponseTag::Handshake,
            ProtocolEvent::Force(_) => ResponseTag::Force,
            ProtocolEvent::PositionControl(_) => ResponseTag::PositionControl,
            ProtocolEvent::ExtendedForce(_) => ResponseTag::ExtendedForce,
            ProtocolEvent::Sleep { .. } => ResponseTag::Sleep,
            ProtocolEvent::Wake { .. } => ResponseTag::Wake,
            ProtocolEvent::ResetPosition { .. } => ResponseTag::ResetPosition,
            ProtocolEvent::ClearErrors { .. } => ResponseTag::ClearErrors,
            ProtocolEvent::Polarity { .. } => ResponseTag::Polarity,
            ProtocolEvent::Temperature { .. } => ResponseTag::Temperature,
            ProtocolEvent::State { .. } => ResponseTag::State,
            ProtocolEvent::Info { .. } => ResponseTag::Info,
            ProtocolEvent::InvalidActuator { .. } => ResponseTag::InvalidActuator,
            ProtocolEvent::InvalidArgument { .. } => ResponseTag::InvalidArgument,
            ProtocolEvent::InitList { .. } => ResponseTag::InitList,
            ProtocolEvent::Unknown { .. } => return None,
        };
        Some(tag)
    }

    /// 成功类事件的目标执行器 ID
    ///
    /// 全局事件（握手、枚举、参数错误、未知标签）以及 `InvalidActuator` 返回 `None`。
    pub fn actuator_id(&self) -> Option<RawActuatorId> {
        match self {
            ProtocolEvent::Force(m) | ProtocolEvent::PositionControl(m) => Some(m.id),
            ProtocolEvent::ExtendedForce(e) => Some(e.id),
            ProtocolEvent::Sleep { id }
            | ProtocolEvent::Wake { id }
            | ProtocolEvent::ResetPosition { id }
            | ProtocolEvent::ClearErrors { id }
            | ProtocolEvent::Polarity { id, .. }
            | ProtocolEvent::Temperature { id, .. }
            | ProtocolEvent::State { id, .. }
            | ProtocolEvent::Info { id, .. } => Some(*id),
            ProtocolEvent::Handshake
            | ProtocolEvent::InvalidActuator { .. }
            | ProtocolEvent::InvalidArgument { .. }
            | ProtocolEvent::InitList { .. }
            | ProtocolEvent::Unknown { .. } => None,
        }
    }

    /// 控制器报告的错误文本（仅 `InvalidActuator` / `InvalidArgument`）
    pub fn controller_error(&self) -> Option<String> {
        match self {
            ProtocolEvent::InvalidActuator { target, .. } => {
                Some(format!("Target actuator {} not available", target))
            },
            ProtocolEvent::InvalidArgument { command, value } => Some(format!(
                "{} is not a valid argument for {} command",
                value, command
            )),
            _ => None,
        }
    }
}

impl TryFrom<&str> for ProtocolEvent {
    type Error = ParseFailure;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        parse_response(line)
    }
}

impl FromStr for ProtocolEvent {
    type Err = ParseFailure;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        parse_response(line)
    }
}

// ============================================================================
// 解析
// ============================================================================

/// 字段游标：按顺序取 token 并转换为目标类型
struct Fields<'a> {
    line: &'a str,
    tag: ResponseTag,
    tokens: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn raw(&mut self, field: &'static str) -> Result<&'a str, ParseFailure> {
        self.tokens.next().ok_or_else(|| {
            ParseFailure::new(
                self.line,
                ParseErrorKind::MissingField {
                    tag: self.tag,
                    field,
                },
            )
        })
    }

    fn number<T: FromStr>(&mut self, field: &'static str) -> Result<T, ParseFailure> {
        let token = self.raw(field)?;
        token.parse::<T>().map_err(|_| self.invalid(field, token))
    }

    fn float(&mut self, field: &'static str) -> Result<f32, ParseFailure> {
        let token = self.raw(field)?;
        match token.parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(self.invalid(field, token)),
        }
    }

    fn id(&mut self) -> Result<RawActuatorId, ParseFailure> {
        self.number::<RawActuatorId>("id")
    }

    fn invalid(&self, field: &'static str, token: &str) -> ParseFailure {
        ParseFailure::new(
            self.line,
            ParseErrorKind::InvalidNumber {
                tag: self.tag,
                field,
                token: token.to_string(),
            },
        )
    }

    fn motion(&mut self) -> Result<MotionFeedback, ParseFailure> {
        Ok(MotionFeedback {
            id: self.id()?,
            force: self.number("force")?,
            position: self.number("position")?,
        })
    }
}

/// 解析一行控制器响应
///
/// 行尾的 `\r` 视为空白自动忽略；多余的尾随 token 会被忽略。
///
/// # 示例
///
/// ```
/// use eagle_protocol::{parse_response, ProtocolEvent, MotionFeedback};
///
/// let event = parse_response("]f 3 -50 12000\r").unwrap();
/// assert_eq!(
///     event,
///     ProtocolEvent::Force(MotionFeedback { id: 3, force: -50, position: 12000 })
/// );
///
/// assert!(parse_response("]f 1 notanumber 300").is_err());
/// ```
pub fn parse_response(line: &str) -> Result<ProtocolEvent, ParseFailure> {
    let mut tokens = line.split_whitespace();

    let Some(tag_token) = tokens.next() else {
        return Err(ParseFailure::new(line, ParseErrorKind::EmptyLine));
    };

    if !tag_token.starts_with(RESPONSE_PREFIX) {
        return Err(ParseFailure::new(
            line,
            ParseErrorKind::MissingPrefix {
                tag: tag_token.to_string(),
            },
        ));
    }

    let Some(tag) = ResponseTag::from_wire(tag_token) else {
        return Ok(ProtocolEvent::Unknown {
            tag: tag_token.to_string(),
        });
    };

    let mut fields = Fields { line, tag, tokens };

    let event = match tag {
        ResponseTag::Handshake => ProtocolEvent::Handshake,

        ResponseTag::Force => ProtocolEvent::Force(fields.motion()?),

        ResponseTag::PositionControl => ProtocolEvent::PositionControl(fields.motion()?),

        ResponseTag::ExtendedForce => {
            let id = fields.id()?;
            let force = fields.number("force")?;
            let position = fields.number("position")?;
            let errors = fields.number("errors")?;
            let temperature = fields.number::<i32>("temperature")?;
            let voltage_mv = fields.number::<i32>("voltage")?;
            let power = fields.number::<i32>("power")?;
            ProtocolEvent::ExtendedForce(ExtendedFeedback {
                id,
                force,
                position,
                errors,
                temperature: temperature as f32,
                voltage: voltage_mv as f32 / MILLIVOLTS_PER_VOLT,
                power: power as f32,
            })
        },

        ResponseTag::Sleep => ProtocolEvent::Sleep { id: fields.id()? },
        ResponseTag::Wake => ProtocolEvent::Wake { id: fields.id()? },
        ResponseTag::ResetPosition => ProtocolEvent::ResetPosition { id: fields.id()? },
        ResponseTag::ClearErrors => ProtocolEvent::ClearErrors { id: fields.id()? },

        ResponseTag::Polarity => ProtocolEvent::Polarity {
            id: fields.id()?,
            polarity: fields.number("polarity")?,
        },

        ResponseTag::Temperature => ProtocolEvent::Temperature {
            id: fields.id()?,
            temperature: fields.float("temperature")?,
        },

        ResponseTag::State => ProtocolEvent::State {
            id: fields.id()?,
            state: fields.number("state")?,
        },

        ResponseTag::Info => {
            let id = fields.id()?;
            let text = fields.tokens.by_ref().collect::<Vec<_>>().join("\n");
            ProtocolEvent::Info { id, text }
        },

        ResponseTag::InvalidActuator => {
            // 目标 ID 非数字时只记录错误，不影响任何执行器
            let target = fields.raw("id")?;
            ProtocolEvent::InvalidActuator {
                target: target.to_string(),
                id: target.parse().ok(),
            }
        },

        ResponseTag::InvalidArgument => {
            // token[1] 为执行器 ID，仅用于定位，不参与错误文本
            fields.raw("id")?;
            let command = fields.raw("command")?.to_string();
            let value = fields.raw("value")?.to_string();
            ProtocolEvent::InvalidArgument { command, value }
        },

        ResponseTag::InitList => {
            let tokens: Vec<&str> = fields.tokens.by_ref().collect();
            let ids = tokens
                .iter()
                .map(|token| {
                    token
                        .parse::<RawActuatorId>()
                        .map_err(|_| fields.invalid("id", token))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ProtocolEvent::InitList { ids }
        },
    };

    Ok(event)
}
