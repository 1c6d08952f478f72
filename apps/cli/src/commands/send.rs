//! 单条命令下发

use crate::connection::ConnectionArgs;
use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use eagle_sdk::prelude::*;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct SendCommand {
    /// 发送后等待应答的时间（毫秒）
    #[arg(short, long, default_value_t = 100)]
    pub wait_ms: u64,

    #[command(subcommand)]
    pub command: Outbound,
}

/// 上行命令（子命令名与线上标签一致）
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Outbound {
    /// 力指令
    F {
        id: ActuatorId,
        #[arg(allow_negative_numbers = true)]
        force: i32,
    },
    /// 扩展力指令（附带遥测）
    Exf {
        id: ActuatorId,
        #[arg(allow_negative_numbers = true)]
        force: i32,
    },
    /// 休眠执行器
    Sleep { id: ActuatorId },
    /// 唤醒执行器
    Wake { id: ActuatorId },
    /// 设置极性（0 正，1 负）
    Pol { id: ActuatorId, polarity: u8 },
    /// 当前位置设为零点
    Rp { id: ActuatorId },
    /// 位置控制目标（毫米）
    Pc {
        id: ActuatorId,
        #[arg(allow_negative_numbers = true)]
        target_mm: i32,
    },
    /// 使能/禁用位置控制（0 或 1）
    Pcen { id: ActuatorId, enable: u8 },
    /// 查询温度
    T { id: ActuatorId },
    /// 清除错误
    Ce { id: ActuatorId },
    /// 查询构建信息
    Info { id: ActuatorId },
    /// 握手
    Handshake,
    /// 系统就绪
    Ready,
    /// 重新枚举
    Init,
}

impl Outbound {
    pub fn to_command(&self) -> Result<EagleCommand> {
        let command = match *self {
            Outbound::F { id, force } => EagleCommand::Force { id, force },
            Outbound::Exf { id, force } => EagleCommand::ExtendedForce { id, force },
            Outbound::Sleep { id } => EagleCommand::Sleep { id },
            Outbound::Wake { id } => EagleCommand::Wake { id },
            Outbound::Pol { id, polarity } => EagleCommand::Polarity {
                id,
                polarity: Polarity::try_from(polarity)
                    .map_err(|_| anyhow!("polarity must be 0 or 1, got {}", polarity))?,
            },
            Outbound::Rp { id } => EagleCommand::ResetPosition { id },
            Outbound::Pc { id, target_mm } => EagleCommand::PositionControl { id, target_mm },
            Outbound::Pcen { id, enable } => match enable {
                0 | 1 => EagleCommand::EnablePositionControl {
                    id,
                    enable: enable == 1,
                },
                _ => return Err(anyhow!("enable must be 0 or 1, got {}", enable)),
            },
            Outbound::T { id } => EagleCommand::Temperature { id },
            Outbound::Ce { id } => EagleCommand::ClearErrors { id },
            Outbound::Info { id } => EagleCommand::Info { id },
            Outbound::Handshake => EagleCommand::Handshake,
            Outbound::Ready => EagleCommand::SystemReady,
            Outbound::Init => EagleCommand::Enumerate,
        };
        Ok(command)
    }
}

impl SendCommand {
    pub fn execute(&self, connection: &ConnectionArgs) -> Result<()> {
        let command = self.command.to_command()?;
        let (eagle, _config) = connection.connect(Some(false))?;

        eagle.send_command(DriverCommand::reliable(command))?;
        println!("-> {}", command);

        std::thread::sleep(Duration::from_millis(self.wait_ms));

        if let Some(error) = eagle.last_error() {
            println!("<- error: {}", error);
        } else if let Some(record) = command.actuator_id().and_then(|id| eagle.actuator(id)) {
            println!("<- {:?}", record);
        } else if command == EagleCommand::Handshake {
            println!("<- confirmed: {}", eagle.is_port_confirmed());
        } else if command == EagleCommand::Enumerate {
            println!("<- actuators: {:?}", eagle.available_actuators());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_to_command() {
        assert_eq!(
            Outbound::F { id: 3, force: -50 }.to_command().unwrap(),
            EagleCommand::Force { id: 3, force: -50 }
        );
        assert_eq!(
            Outbound::Pol { id: 1, polarity: 1 }.to_command().unwrap(),
            EagleCommand::Polarity {
                id: 1,
                polarity: Polarity::Negative
            }
        );
        assert_eq!(Outbound::Init.to_command().unwrap(), EagleCommand::Enumerate);
        assert_eq!(Outbound::Ready.to_command().unwrap(), EagleCommand::SystemReady);
    }

    #[test]
    fn test_outbound_rejects_bad_flags() {
        assert!(Outbound::Pol { id: 0, polarity: 2 }.to_command().is_err());
        assert!(Outbound::Pcen { id: 0, enable: 5 }.to_command().is_err());
    }
}
