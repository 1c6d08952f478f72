//! 执行器状态表
//!
//! `ActuatorRegistry` 是唯一的共享可变状态：接收线程写入，控制循环读取。
//! 注册表本身不加锁，由 [`EagleContext`] 用一把 `RwLock` 整体保护，
//! 每次 apply 或读取都是一个完整临界区，因此读者不会看到"半条事件"。

use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use eagle_protocol::{
    ActuatorId, ExtendedFeedback, MotionFeedback, ParseFailure, ProtocolEvent, RawActuatorId,
    parse_response,
};
use parking_lot::RwLock;
use std::time::{Duration, Instant};

// ============================================================================
// 单个执行器
// ============================================================================

/// 单个执行器槽位的状态
///
/// 字段只由 apply 路径修改；每个事件只覆盖它携带的字段。
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorRecord {
    /// 槽位下标（不可变）
    pub id: ActuatorId,
    /// 控制器是否确认该执行器在线
    pub enumerated: bool,
    pub force: i32,
    /// 位置（微米）
    pub position: i64,
    /// 温度（°C，来自 `]exf` 或 `]t`）
    pub temperature: f32,
    /// 电压（V，来自 `]exf`）
    pub voltage: f32,
    /// 功率（来自 `]exf`）
    pub power: f32,
    pub polarity: i32,
    /// 错误标志位（来自 `]exf`）
    pub error_flags: i32,
    pub state: i32,
    /// 构建信息/序列号（来自 `]info`，多行）
    pub info_text: String,
    /// 最近一次成功应答的时间（单调时钟）
    pub last_response: Option<Instant>,
}

impl ActuatorRecord {
    fn new(id: ActuatorId) -> Self {
        Self {
            id,
            enumerated: false,
            force: 0,
            position: 0,
            temperature: 0.0,
            voltage: 0.0,
            power: 0.0,
            polarity: 0,
            error_flags: 0,
            state: 0,
            info_text: String::new(),
            last_response: None,
        }
    }

    fn apply_motion(&mut self, feedback: &MotionFeedback) {
        self.force = feedback.force;
        self.position = feedback.position;
    }

    fn apply_extended(&mut self, feedback: &ExtendedFeedback) {
        self.force = feedback.force;
        self.position = feedback.position;
        self.error_flags = feedback.errors;
        self.temperature = feedback.temperature;
        self.voltage = feedback.voltage;
        self.power = feedback.power;
    }
}

// ============================================================================
// 注册表
// ============================================================================

/// 单行处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 事件已应用（全局事件的 `id` 为 `None`）
    Applied { id: Option<ActuatorId> },
    /// 控制器报告错误（`]invalid_act` / `]invalid_arg`），文本见 `last_error`
    ControllerError,
    /// 事件引用的 ID 超出槽位范围，未做任何修改
    OutOfRange { id: RawActuatorId },
    /// 未识别的标签，未做任何修改
    UnknownTag,
    /// 行解析失败，未做任何修改
    ParseFailed,
    /// 空行：只清除 `last_error`
    Blank,
}

impl ApplyOutcome {
    /// 是否修改了注册表状态
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

/// 固定容量的执行器状态表
///
/// # 示例
///
/// ```
/// use eagle_driver::ActuatorRegistry;
/// use eagle_protocol::parse_response;
///
/// let mut registry = ActuatorRegistry::new(8).unwrap();
/// registry.apply(parse_response("]init 0 2 5").unwrap());
/// assert_eq!(registry.available_actuators(), vec![0, 2, 5]);
///
/// registry.apply(parse_response("]invalid_act 2").unwrap());
/// assert_eq!(registry.available_actuators(), vec![0, 5]);
/// assert_eq!(registry.last_error(), Some("Target actuator 2 not available"));
/// ```
#[derive(Debug, Clone)]
pub struct ActuatorRegistry {
    actuators: Vec<ActuatorRecord>,
    last_error: Option<String>,
    port_confirmed: bool,
}

/// 槽位数上限（ID 为 u8）
const MAX_CAPACITY: usize = ActuatorId::MAX as usize + 1;

impl ActuatorRegistry {
    /// 创建注册表（容量固定，之后不再增减槽位）
    ///
    /// 容量为 0 或超过 256 返回 `DriverError::InvalidInput`。
    pub fn new(capacity: usize) -> Result<Self, DriverError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(DriverError::InvalidInput(format!(
                "actuator registry capacity must be in 1..={}, got {}",
                MAX_CAPACITY, capacity
            )));
        }
        let actuators = (0..capacity)
            .map(|i| ActuatorRecord::new(i as ActuatorId))
            .collect();
        Ok(Self {
            actuators,
            last_error: None,
            port_confirmed: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.actuators.len()
    }

    /// 解析并应用一行（接收流水线的单行入口）
    pub fn process_line(&mut self, line: &str) -> ApplyOutcome {
        self.process_line_at(line, Instant::now())
    }

    pub fn process_line_at(&mut self, line: &str, now: Instant) -> ApplyOutcome {
        if line.trim().is_empty() {
            return self.skip_blank();
        }
        match parse_response(line) {
            Ok(event) => self.apply_at(event, now),
            Err(failure) => self.reject(&failure),
        }
    }

    /// 跳过空行（不解析，但仍清除上一行留下的 `last_error`）
    pub fn skip_blank(&mut self) -> ApplyOutcome {
        self.last_error = None;
        ApplyOutcome::Blank
    }

    /// 记录解析失败（清空并覆盖 `last_error`，不修改任何执行器）
    pub fn reject(&mut self, failure: &ParseFailure) -> ApplyOutcome {
        self.last_error = Some(failure.to_string());
        ApplyOutcome::ParseFailed
    }

    /// 应用一个事件
    pub fn apply(&mut self, event: ProtocolEvent) -> ApplyOutcome {
        self.apply_at(event, Instant::now())
    }

    /// 应用一个事件（显式指定时间戳，便于测试）
    pub fn apply_at(&mut self, event: ProtocolEvent, now: Instant) -> ApplyOutcome {
        // 错误只反映最近一行
        self.last_error = None;

        match event {
            ProtocolEvent::Handshake => {
                self.port_confirmed = true;
                ApplyOutcome::Applied { id: None }
            },

            ProtocolEvent::InvalidActuator { id, .. } => {
                self.last_error = event.controller_error();
                // 非数字或越界的目标只记录错误
                if let Some(record) = id.and_then(|id| self.slot_mut(id)) {
                    record.enumerated = false;
                }
                ApplyOutcome::ControllerError
            },

            ProtocolEvent::InvalidArgument { .. } => {
                self.last_error = event.controller_error();
                ApplyOutcome::ControllerError
            },

            ProtocolEvent::InitList { ids } => {
                // 任一 ID 越界则整行拒绝，不做部分应用
                if let Some(&bad) = ids.iter().find(|&&id| self.slot_index(id).is_none()) {
                    return self.out_of_range(bad);
                }
                for id in ids {
                    if let Some(record) = self.slot_mut(id) {
                        record.enumerated = true;
                    }
                }
                ApplyOutcome::Applied { id: None }
            },

            ProtocolEvent::Unknown { tag } => {
                self.last_error = Some(format!("Unknown response tag {}", tag));
                ApplyOutcome::UnknownTag
            },

            other => self.apply_to_actuator(other, now),
        }
    }

    /// 单执行器成功事件：覆盖事件携带的字段，标记在线，刷新时间戳
    fn apply_to_actuator(&mut self, event: ProtocolEvent, now: Instant) -> ApplyOutcome {
        let Some(raw_id) = event.actuator_id() else {
            return ApplyOutcome::Applied { id: None };
        };
        let Some(index) = self.slot_index(raw_id) else {
            return self.out_of_range(raw_id);
        };
        let record = &mut self.actuators[index];

        match event {
            ProtocolEvent::Force(m) | ProtocolEvent::PositionControl(m) => record.apply_motion(&m),
            ProtocolEvent::ExtendedForce(e) => record.apply_extended(&e),
            ProtocolEvent::Polarity { polarity, .. } => record.polarity = polarity,
            ProtocolEvent::Temperature { temperature, .. } => record.temperature = temperature,
            ProtocolEvent::State { state, .. } => record.state = state,
            ProtocolEvent::Info { text, .. } => record.info_text = text,
            // 仅存活确认
            _ => {},
        }

        record.enumerated = true;
        record.last_response = Some(now);
        ApplyOutcome::Applied {
            id: Some(record.id),
        }
    }

    fn out_of_range(&mut self, id: RawActuatorId) -> ApplyOutcome {
        self.last_error = Some(format!(
            "Actuator id {} out of range (0..{})",
            id,
            self.actuators.len()
        ));
        ApplyOutcome::OutOfRange { id }
    }

    fn slot_index(&self, id: RawActuatorId) -> Option<usize> {
        usize::try_from(id)
            .ok()
            .filter(|&index| index < self.actuators.len())
    }

    fn slot_mut(&mut self, id: RawActuatorId) -> Option<&mut ActuatorRecord> {
        let index = self.slot_index(id)?;
        self.actuators.get_mut(index)
    }

    // ------------------------------------------------------------------------
    // 读取
    // ------------------------------------------------------------------------

    pub fn actuator(&self, id: ActuatorId) -> Option<&ActuatorRecord> {
        self.actuators.get(id as usize)
    }

    pub fn actuators(&self) -> &[ActuatorRecord] {
        &self.actuators
    }

    /// 当前在线执行器 ID（升序，按需由 `enumerated` 标志计算）
    pub fn available_actuators(&self) -> Vec<ActuatorId> {
        self.actuators
            .iter()
            .filter(|a| a.enumerated)
            .map(|a| a.id)
            .collect()
    }

    /// 最近一行产生的错误文本
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 是否已收到握手应答
    pub fn is_port_confirmed(&self) -> bool {
        self.port_confirmed
    }

    /// 重新握手前清除确认标志
    pub fn clear_port_confirmation(&mut self) {
        self.port_confirmed = false;
    }

    /// 执行器是否超过 `timeout` 未应答
    ///
    /// 从未应答过或 ID 越界都视为过期。
    pub fn is_stale(&self, id: ActuatorId, timeout: Duration, now: Instant) -> bool {
        match self.actuator(id).and_then(|a| a.last_response) {
            Some(last) => now.saturating_duration_since(last) > timeout,
            None => true,
        }
    }

    /// 一致性快照（在同一临界区内复制全部字段）
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            actuators: self.actuators.clone(),
            available: self.available_actuators(),
            last_error: self.last_error.clone(),
            port_confirmed: self.port_confirmed,
        }
    }
}

/// 注册表快照（脱离锁后使用）
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    pub actuators: Vec<ActuatorRecord>,
    pub available: Vec<ActuatorId>,
    pub last_error: Option<String>,
    pub port_confirmed: bool,
}

// ============================================================================
// 共享上下文
// ============================================================================

/// IO 线程与用户线程共享的上下文
pub struct EagleContext {
    /// 执行器状态表（一把粗粒度锁）
    pub registry: RwLock<ActuatorRegistry>,
    /// 链路存活监测（最后一次收到完整行的时间）
    pub connection_monitor: ConnectionMonitor,
}

impl EagleContext {
    pub fn new(capacity: usize, connection_timeout: Duration) -> Result<Self, DriverError> {
        Ok(Self {
            registry: RwLock::new(ActuatorRegistry::new(capacity)?),
            connection_monitor: ConnectionMonitor::new(connection_timeout),
        })
    }
}
