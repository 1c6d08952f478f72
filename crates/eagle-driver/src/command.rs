//! 命令类型定义模块
//!
//! 提供命令优先级和类型区分机制，优化丢弃策略。

use eagle_protocol::EagleCommand;
use smallvec::SmallVec;

/// 命令缓冲区类型
///
/// 栈上预留 8 个位置，正好覆盖默认 8 个执行器槽位：
/// 1 kHz 力控循环每个周期为每个执行器下发一条 `[f`，整包一次性写出，
/// 不会被下一周期的单条命令拆散。
pub type CommandBuffer = SmallVec<[EagleCommand; 8]>;

/// 实时命令（单条或整包，统一使用 CommandBuffer）
#[derive(Debug, Clone)]
pub struct RealtimeCommand {
    commands: CommandBuffer,
}

impl RealtimeCommand {
    #[inline]
    pub fn single(command: EagleCommand) -> Self {
        let mut buffer = CommandBuffer::new();
        buffer.push(command);
        RealtimeCommand { commands: buffer }
    }

    /// 创建命令包
    ///
    /// 超过 8 条时 SmallVec 会退化为堆分配，仍然正确但失去零分配保证。
    #[inline]
    pub fn package(commands: impl IntoIterator<Item = EagleCommand>) -> Self {
        let buffer: CommandBuffer = commands.into_iter().collect();
        RealtimeCommand { commands: buffer }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &EagleCommand> {
        self.commands.iter()
    }

    /// 整包编码为一次写出的字节（每条命令各自带 `\r`）
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.commands.len() * 16);
        for command in &self.commands {
            command.encode_into(&mut out);
        }
        out.into_bytes()
    }
}

/// 命令优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPriority {
    /// 实时控制命令（可丢弃）
    ///
    /// 用于 1 kHz 力控命令。邮箱中未发送的旧命令会被新命令覆盖，
    /// 保证发出的总是最新的力指令。
    RealtimeControl,

    /// 可靠命令（不可丢弃）
    ///
    /// 用于握手、枚举、休眠/唤醒、极性设置等关键命令。
    /// FIFO 队列按顺序发送，不会覆盖；队列满时返回错误。
    ReliableCommand,
}

/// 带优先级的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCommand {
    pub command: EagleCommand,
    pub priority: CommandPriority,
}

impl DriverCommand {
    pub fn realtime(command: EagleCommand) -> Self {
        Self {
            command,
            priority: CommandPriority::RealtimeControl,
        }
    }

    pub fn reliable(command: EagleCommand) -> Self {
        Self {
            command,
            priority: CommandPriority::ReliableCommand,
        }
    }

    pub fn command(&self) -> EagleCommand {
        self.command
    }

    pub fn priority(&self) -> CommandPriority {
        self.priority
    }
}

impl From<EagleCommand> for DriverCommand {
    /// 默认为可靠命令
    fn from(command: EagleCommand) -> Self {
        Self::reliable(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_priority() {
        let cmd = EagleCommand::Force { id: 0, force: 10 };

        let realtime_cmd = DriverCommand::realtime(cmd);
        assert_eq!(realtime_cmd.priority(), CommandPriority::RealtimeControl);

        let reliable_cmd = DriverCommand::reliable(cmd);
        assert_eq!(reliable_cmd.priority(), CommandPriority::ReliableCommand);
    }

    #[test]
    fn test_command_from_eagle_command() {
        let cmd: DriverCommand = EagleCommand::Handshake.into();
        assert_eq!(cmd.priority(), CommandPriority::ReliableCommand);
        assert_eq!(cmd.command(), EagleCommand::Handshake);
    }

    #[test]
    fn test_realtime_command_single() {
        let cmd = RealtimeCommand::single(EagleCommand::Force { id: 1, force: -5 });
        assert_eq!(cmd.len(), 1);
        assert!(!cmd.is_empty());
        assert_eq!(cmd.encode(), b"[f 1 -5\r");
    }

    #[test]
    fn test_realtime_command_package_encode() {
        let cmd = RealtimeCommand::package(
            (0..3).map(|id| EagleCommand::Force { id, force: 100 }),
        );
        assert_eq!(cmd.len(), 3);
        assert_eq!(cmd.encode(), b"[f 0 100\r[f 1 100\r[f 2 100\r");
    }

    #[test]
    fn test_realtime_command_empty() {
        let commands: [EagleCommand; 0] = [];
        let cmd = RealtimeCommand::package(commands);
        assert!(cmd.is_empty());
        assert!(cmd.encode().is_empty());
    }

    #[test]
    fn test_realtime_command_iter_in_order() {
        let cmd = RealtimeCommand::package([
            EagleCommand::Sleep { id: 0 },
            EagleCommand::Sleep { id: 1 },
        ]);
        let ids: Vec<_> = cmd.iter().filter_map(|c| c.actuator_id()).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
