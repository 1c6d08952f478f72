//! 监控命令

use crate::connection::ConnectionArgs;
use anyhow::Result;
use clap::Args;
use eagle_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 监控时长（秒），不指定则直到 Ctrl+C
    #[arg(short, long)]
    pub seconds: Option<u64>,

    /// 刷新频率（Hz）
    #[arg(short, long, default_value_t = 10)]
    pub frequency: u32,
}

impl MonitorCommand {
    pub fn execute(&self, connection: &ConnectionArgs) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
            println!("\nStopping monitor...");
        })?;

        let (eagle, _config) = connection.connect(None)?;
        if let Err(e) = eagle.confirm_port() {
            warn!("Handshake failed: {}", e);
        }
        eagle.enumerate()?;

        println!("Monitoring {} (Ctrl+C to stop)", eagle.port_name());

        let interval = Duration::from_secs_f64(1.0 / self.frequency.max(1) as f64);
        let deadline = self.seconds.map(|s| Instant::now() + Duration::from_secs(s));

        while running.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            print_snapshot(&eagle.snapshot(), eagle.is_connected());
            std::thread::sleep(interval);
        }

        let metrics = eagle.get_metrics();
        println!(
            "lines: {} parsed: {} failures: {} ({:.2}%) sent: {}",
            metrics.rx_lines_total,
            metrics.rx_lines_parsed,
            metrics.rx_parse_failures,
            metrics.parse_failure_rate(),
            metrics.tx_commands_total
        );
        Ok(())
    }
}

fn print_snapshot(snapshot: &RegistrySnapshot, connected: bool) {
    let link = if connected { "up" } else { "down" };
    println!("link {} roster {:?}", link, snapshot.available);
    for record in snapshot.actuators.iter().filter(|a| a.enumerated) {
        println!(
            "  #{:<3} force {:>6}  position {:>8}  temp {:>5.1}  {:>5.2} V",
            record.id, record.force, record.position, record.temperature, record.voltage
        );
    }
    if let Some(error) = &snapshot.last_error {
        println!("  last error: {}", error);
    }
}
