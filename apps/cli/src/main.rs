//! # Eagle CLI
//!
//! Command-line interface for Eagle force-actuator controllers.
//!
//! ```bash
//! # 确认串口上是 Eagle 固件
//! eagle-cli --port /dev/ttyACM0 handshake
//!
//! # 持续打印执行器力和位置（Ctrl+C 停止）
//! eagle-cli --port /dev/ttyACM0 monitor --seconds 10
//!
//! # 下发单条命令
//! eagle-cli --port /dev/ttyACM0 send f 0 -50
//! eagle-cli --config eagle.toml send init
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod connection;

use commands::{HandshakeCommand, MonitorCommand, SendCommand};
use connection::ConnectionArgs;

/// Eagle CLI - 执行器控制器命令行工具
#[derive(Parser, Debug)]
#[command(name = "eagle-cli")]
#[command(about = "Command-line interface for Eagle force-actuator controllers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 握手并报告串口是否连接到 Eagle 固件
    Handshake(HandshakeCommand),

    /// 监控执行器状态
    Monitor(MonitorCommand),

    /// 发送单条命令
    Send(SendCommand),
}

fn main() -> Result<()> {
    eagle_sdk::init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Handshake(cmd) => cmd.execute(&cli.connection),
        Commands::Monitor(cmd) => cmd.execute(&cli.connection),
        Commands::Send(cmd) => cmd.execute(&cli.connection),
    }
}
