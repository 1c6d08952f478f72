//! Eagle 驱动性能指标模块
//!
//! 提供零开销的原子计数器，用于监控串口链路的健康状态。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// Eagle 驱动实时指标
///
/// # 使用示例
///
/// ```rust
/// use eagle_driver::EagleMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = EagleMetrics::default();
/// metrics.rx_lines_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_lines_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct EagleMetrics {
    /// RX 接收的总字节数
    pub rx_bytes_total: AtomicU64,

    /// RX 重组出的总行数（不含空行）
    pub rx_lines_total: AtomicU64,

    /// RX 成功解析并应用的行数
    pub rx_lines_parsed: AtomicU64,

    /// RX 解析失败的行数
    pub rx_parse_failures: AtomicU64,

    /// RX 执行器 ID 越界次数
    pub rx_out_of_range: AtomicU64,

    /// 控制器报告的错误次数（`]invalid_act` / `]invalid_arg`）
    pub rx_controller_errors: AtomicU64,

    /// 未识别标签次数
    pub rx_unknown_tags: AtomicU64,

    /// 超长行被丢弃次数
    pub rx_overflows: AtomicU64,

    /// 轮询无数据次数（正常现象）
    pub rx_empty_polls: AtomicU64,

    /// TX 写出的命令总数
    pub tx_commands_total: AtomicU64,

    /// TX 实时邮箱覆盖（Overwrite）次数
    ///
    /// 如果这个值快速增长，说明 TX 线程写出速度跟不上命令生成速度。
    pub tx_realtime_overwrites: AtomicU64,

    /// TX 可靠队列满（丢弃）次数
    pub tx_reliable_drops: AtomicU64,

    /// 串口设备错误次数
    pub device_errors: AtomicU64,
}

impl EagleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 各计数器分别以 `Ordering::Relaxed` 读取，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_bytes_total: self.rx_bytes_total.load(Ordering::Relaxed),
            rx_lines_total: self.rx_lines_total.load(Ordering::Relaxed),
            rx_lines_parsed: self.rx_lines_parsed.load(Ordering::Relaxed),
            rx_parse_failures: self.rx_parse_failures.load(Ordering::Relaxed),
            rx_out_of_range: self.rx_out_of_range.load(Ordering::Relaxed),
            rx_controller_errors: self.rx_controller_errors.load(Ordering::Relaxed),
            rx_unknown_tags: self.rx_unknown_tags.load(Ordering::Relaxed),
            rx_overflows: self.rx_overflows.load(Ordering::Relaxed),
            rx_empty_polls: self.rx_empty_polls.load(Ordering::Relaxed),
            tx_commands_total: self.tx_commands_total.load(Ordering::Relaxed),
            tx_realtime_overwrites: self.tx_realtime_overwrites.load(Ordering::Relaxed),
            tx_reliable_drops: self.tx_reliable_drops.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器（用于性能测试）
    pub fn reset(&self) {
        for counter in [
            &self.rx_bytes_total,
            &self.rx_lines_total,
            &self.rx_lines_parsed,
            &self.rx_parse_failures,
            &self.rx_out_of_range,
            &self.rx_controller_errors,
            &self.rx_unknown_tags,
            &self.rx_overflows,
            &self.rx_empty_polls,
            &self.tx_commands_total,
            &self.tx_realtime_overwrites,
            &self.tx_reliable_drops,
            &self.device_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照（不可变，用于读取）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rx_bytes_total: u64,
    pub rx_lines_total: u64,
    pub rx_lines_parsed: u64,
    pub rx_parse_failures: u64,
    pub rx_out_of_range: u64,
    pub rx_controller_errors: u64,
    pub rx_unknown_tags: u64,
    pub rx_overflows: u64,
    pub rx_empty_polls: u64,
    pub tx_commands_total: u64,
    pub tx_realtime_overwrites: u64,
    pub tx_reliable_drops: u64,
    pub device_errors: u64,
}

impl MetricsSnapshot {
    /// 解析失败率（百分比，0.0 ~ 100.0）
    ///
    /// `rx_lines_total` 为 0 时返回 0.0。
    pub fn parse_failure_rate(&self) -> f64 {
        if self.rx_lines_total == 0 {
            return 0.0;
        }
        (self.rx_parse_failures as f64 / self.rx_lines_total as f64) * 100.0
    }

    /// 实时邮箱覆盖率（百分比，0.0 ~ 100.0）
    pub fn overwrite_rate(&self) -> f64 {
        if self.tx_commands_total == 0 {
            return 0.0;
        }
        (self.tx_realtime_overwrites as f64 / self.tx_commands_total as f64) * 100.0
    }
}
