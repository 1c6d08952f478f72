//! 连接参数（命令行优先于配置文件）

use anyhow::{Context, Result, bail};
use clap::Args;
use eagle_sdk::{DriverConfig, Eagle, EagleBuilder};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// 串口设备路径（如 /dev/ttyACM0 或 COM3）
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// 波特率（覆盖配置文件）
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// TOML 配置文件
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    /// 合并配置文件和命令行参数
    pub fn driver_config(&self) -> Result<DriverConfig> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => DriverConfig::default(),
        };

        if let Some(port) = &self.port {
            config.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if config.port.is_none() {
            bail!("no serial port given, use --port or set `port` in the config file");
        }
        Ok(config)
    }

    /// 打开串口并启动驱动
    pub fn connect(&self, sleep_on_drop: Option<bool>) -> Result<(Eagle, DriverConfig)> {
        let config = self.driver_config()?;
        debug!("Driver config: {:?}", config);

        let mut builder = EagleBuilder::from_config(&config);
        if let Some(enabled) = sleep_on_drop {
            builder = builder.sleep_on_drop(enabled);
        }
        let port = config.port.as_deref().unwrap_or_default();
        let eagle = builder
            .build()
            .with_context(|| format!("failed to open {}", port))?;
        Ok((eagle, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_required() {
        let args = ConnectionArgs {
            port: None,
            baud: None,
            config: None,
        };
        assert!(args.driver_config().is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = ConnectionArgs {
            port: Some("/dev/ttyACM1".to_string()),
            baud: Some(57_600),
            config: None,
        };
        let config = args.driver_config().unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.actuator_count, 8);
    }

    #[test]
    fn test_missing_config_file() {
        let args = ConnectionArgs {
            port: Some("/dev/ttyACM1".to_string()),
            baud: None,
            config: Some(PathBuf::from("/nonexistent/eagle.toml")),
        };
        let err = args.driver_config().unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }
}
