//! 握手命令

use crate::connection::ConnectionArgs;
use anyhow::{Result, bail};
use clap::Args;
use eagle_sdk::DriverError;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct HandshakeCommand {
    /// 等待应答的时间（毫秒，覆盖配置文件）
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// 握手成功后重新枚举并列出执行器
    #[arg(short, long)]
    pub enumerate: bool,
}

impl HandshakeCommand {
    pub fn execute(&self, connection: &ConnectionArgs) -> Result<()> {
        let (eagle, config) = connection.connect(Some(false))?;
        let timeout = self
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.handshake_timeout());

        eagle.handshake()?;
        match eagle.wait_for_handshake(timeout) {
            Ok(()) => println!("Eagle controller confirmed on {}", eagle.port_name()),
            Err(DriverError::Timeout) => {
                bail!(
                    "no handshake response on {} within {:?}, try another port",
                    eagle.port_name(),
                    timeout
                );
            },
            Err(e) => return Err(e.into()),
        }

        if self.enumerate {
            eagle.enumerate()?;
            std::thread::sleep(timeout);
            let available = eagle.available_actuators();
            if available.is_empty() {
                println!("No actuators enumerated");
            } else {
                println!("Actuators: {:?}", available);
            }
        }

        Ok(())
    }
}
