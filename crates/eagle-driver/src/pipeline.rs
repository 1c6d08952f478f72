//! Pipeline IO 循环模块
//!
//! 负责后台 IO 线程的串口轮询、行重组、解析和状态更新，以及命令写出。
//!
//! 接收路径：`read_available` → `LineReassembler::feed` → 空行只清除错误 →
//! `parse_response` → 在写锁内 `apply` → 计数 → 刷新连接监测。
//! 解析在锁外完成，临界区只包含 apply 本身。

use crate::command::RealtimeCommand;
use crate::metrics::EagleMetrics;
use crate::state::{ApplyOutcome, EagleContext};
use crossbeam_channel::{Receiver, TryRecvError};
use eagle_protocol::{EagleCommand, LineReassembler, parse_response};
use eagle_serial::{RxAdapter, SerialAdapter, SerialError, TxAdapter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use eagle_driver::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.poll_interval_us, 200);
///
/// let config = PipelineConfig {
///     max_pending_bytes: Some(4096),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 轮询无数据时的休眠时间（微秒）
    pub poll_interval_us: u64,
    /// 单行长度上限（字节），`None` 表示不限制
    pub max_pending_bytes: Option<usize>,
    /// 超过此时间未收到任何完整行视为连接断开（毫秒）
    pub connection_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 200,
            max_pending_bytes: None,
            connection_timeout_ms: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// 接收路径的线程私有状态
pub struct ReceiveState {
    reassembler: LineReassembler,
}

impl ReceiveState {
    pub fn new(config: &PipelineConfig) -> Self {
        let reassembler = match config.max_pending_bytes {
            Some(limit) => LineReassembler::with_max_pending(limit),
            None => LineReassembler::new(),
        };
        Self { reassembler }
    }

    pub fn pending(&self) -> &[u8] {
        self.reassembler.pending()
    }

    /// 丢弃未完成行
    pub fn discard_partial(&mut self) {
        if !self.reassembler.pending().is_empty() {
            debug!(
                "Discarding {} buffered byte(s) after read error",
                self.reassembler.pending().len()
            );
        }
        self.reassembler.reset();
    }
}

/// 处理一个接收分块，返回成功应用的行数
pub fn process_chunk(
    chunk: &[u8],
    state: &mut ReceiveState,
    ctx: &EagleContext,
    metrics: &EagleMetrics,
) -> usize {
    if chunk.is_empty() {
        return 0;
    }
    metrics
        .rx_bytes_total
        .fetch_add(chunk.len() as u64, Ordering::Relaxed);

    let overflows_before = state.reassembler.overflows();
    let lines = state.reassembler.feed(chunk);
    let overflowed = state.reassembler.overflows() - overflows_before;
    if overflowed > 0 {
        warn!("Discarded {} over-long line(s) from controller", overflowed);
        metrics
            .rx_overflows
            .fetch_add(overflowed, Ordering::Relaxed);
    }

    let mut applied = 0;
    for line in lines {
        if line.trim().is_empty() {
            ctx.registry.write().skip_blank();
            continue;
        }
        metrics.rx_lines_total.fetch_add(1, Ordering::Relaxed);
        ctx.connection_monitor.register_feedback();
        trace!("RX line: {:?}", line);

        if process_line(&line, ctx, metrics) {
            applied += 1;
        }
    }
    applied
}

fn process_line(line: &str, ctx: &EagleContext, metrics: &EagleMetrics) -> bool {
    let event = match parse_response(line) {
        Ok(event) => event,
        Err(failure) => {
            warn!("Failed to parse controller line: {}", failure);
            metrics.rx_parse_failures.fetch_add(1, Ordering::Relaxed);
            ctx.registry.write().reject(&failure);
            return false;
        },
    };

    let now = Instant::now();
    let (outcome, last_error) = {
        let mut registry = ctx.registry.write();
        let outcome = registry.apply_at(event, now);
        let last_error = match outcome {
            ApplyOutcome::Applied { .. } => None,
            _ => registry.last_error().map(str::to_string),
        };
        (outcome, last_error)
    };

    let message = last_error.as_deref().unwrap_or_default();
    match outcome {
        ApplyOutcome::Applied { id } => {
            metrics.rx_lines_parsed.fetch_add(1, Ordering::Relaxed);
            debug!("Applied {:?} for actuator {:?}", line.trim_end(), id);
            return true;
        },
        ApplyOutcome::ControllerError => {
            metrics.rx_controller_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Controller reported error: {}", message);
        },
        ApplyOutcome::OutOfRange { id } => {
            metrics.rx_out_of_range.fetch_add(1, Ordering::Relaxed);
            warn!("Actuator id {} out of range: {}", id, message);
        },
        ApplyOutcome::UnknownTag => {
            metrics.rx_unknown_tags.fetch_add(1, Ordering::Relaxed);
            warn!("{}", message);
        },
        ApplyOutcome::ParseFailed => {
            metrics.rx_parse_failures.fetch_add(1, Ordering::Relaxed);
        },
        ApplyOutcome::Blank => {},
    }
    false
}

/// 处理读错误，返回是否为致命错误（致命时清除运行标志）
///
/// 超时以外的非致命错误可能丢失了字节，缓冲的半行随之丢弃，
/// 避免与下一块数据拼成一条错误的行。
fn handle_read_error(
    e: &SerialError,
    state: &mut ReceiveState,
    is_running: &AtomicBool,
    metrics: &EagleMetrics,
) -> bool {
    metrics.device_errors.fetch_add(1, Ordering::Relaxed);
    if e.is_fatal() {
        error!("RX: fatal serial error: {}, stopping IO threads", e);
        // Release: all writes before this are visible to threads that see the false value
        is_running.store(false, Ordering::Release);
        return true;
    }
    // 非致命错误视为本周期无数据
    trace!("RX: transient serial error: {}", e);
    if !matches!(e, SerialError::Timeout) {
        state.discard_partial();
    }
    false
}

/// 写出一条命令，返回是否为致命错误
fn write_command(
    write: &mut impl FnMut(&[u8]) -> Result<(), SerialError>,
    command: &EagleCommand,
    is_running: &AtomicBool,
    metrics: &EagleMetrics,
) -> bool {
    match write(command.encode().as_bytes()) {
        Ok(()) => {
            metrics.tx_commands_total.fetch_add(1, Ordering::Relaxed);
            trace!("TX: {}", command);
            false
        },
        Err(e) => {
            error!("Failed to send {}: {}", command, e);
            metrics.device_errors.fetch_add(1, Ordering::Relaxed);
            if e.is_fatal() {
                is_running.store(false, Ordering::Release);
                return true;
            }
            false
        },
    }
}

/// Drain 可靠命令队列（带时间预算）
///
/// 单次最多发送 32 条、占用 500µs，避免积压命令拖慢接收。
///
/// # 返回值
/// 命令通道已断开或写出遇到致命错误时返回 `true`。
fn drain_tx_queue(
    mut write: impl FnMut(&[u8]) -> Result<(), SerialError>,
    cmd_rx: &Receiver<EagleCommand>,
    is_running: &AtomicBool,
    metrics: &EagleMetrics,
) -> bool {
    const MAX_DRAIN_PER_CYCLE: usize = 32;
    const TIME_BUDGET: Duration = Duration::from_micros(500);

    let start = Instant::now();

    for _ in 0..MAX_DRAIN_PER_CYCLE {
        if start.elapsed() > TIME_BUDGET {
            trace!("Drain time budget exhausted, deferred {} commands", cmd_rx.len());
            break;
        }

        match cmd_rx.try_recv() {
            Ok(command) => {
                if write_command(&mut write, &command, is_running, metrics) {
                    return true;
                }
            },
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => return true,
        }
    }

    false
}

/// 退出前尽力写出队列中剩余的可靠命令（如析构时的休眠命令），不重试
fn flush_reliable_on_exit(
    mut write: impl FnMut(&[u8]) -> Result<(), SerialError>,
    cmd_rx: &Receiver<EagleCommand>,
    metrics: &EagleMetrics,
) {
    let mut flushed = 0;
    while let Ok(command) = cmd_rx.try_recv() {
        match write(command.encode().as_bytes()) {
            Ok(()) => {
                flushed += 1;
                metrics.tx_commands_total.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                warn!("Failed to flush {} on shutdown: {}", command, e);
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
    if flushed > 0 {
        debug!("Flushed {} reliable command(s) on shutdown", flushed);
    }
}

/// 单线程 IO 循环
///
/// 同一线程轮流执行：发送积压命令 → 轮询接收 → 再次发送。
/// 退出时写出剩余命令并关闭串口。
///
/// # 参数
/// - `port`: 串口适配器（已打开，由本线程独占）
/// - `cmd_rx`: 可靠命令队列
/// - `ctx`: 共享状态上下文
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（`Eagle` 析构时清除）
/// - `metrics`: 性能指标
pub fn io_loop(
    mut port: impl SerialAdapter,
    cmd_rx: Receiver<EagleCommand>,
    ctx: Arc<EagleContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<EagleMetrics>,
) {
    let mut state = ReceiveState::new(&config);
    let poll_interval = config.poll_interval();
    let mut fatal = false;

    loop {
        // Acquire: if we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("IO thread: is_running flag is false, exiting");
            break;
        }

        // 双重 Drain：进入循环先发一波
        if drain_tx_queue(|b| port.write(b), &cmd_rx, &is_running, &metrics) {
            fatal = !is_running.load(Ordering::Acquire);
            break;
        }

        match port.read_available() {
            Ok(chunk) if chunk.is_empty() => {
                metrics.rx_empty_polls.fetch_add(1, Ordering::Relaxed);
                spin_sleep::sleep(poll_interval);
            },
            Ok(chunk) => {
                process_chunk(&chunk, &mut state, &ctx, &metrics);
            },
            Err(e) => {
                if handle_read_error(&e, &mut state, &is_running, &metrics) {
                    fatal = true;
                    break;
                }
                spin_sleep::sleep(poll_interval);
            },
        }

        // 收到数据后立即发送（此时上层往往已算出新命令）
        if drain_tx_queue(|b| port.write(b), &cmd_rx, &is_running, &metrics) {
            fatal = !is_running.load(Ordering::Acquire);
            break;
        }
    }

    if !fatal {
        flush_reliable_on_exit(|b| port.write(b), &cmd_rx, &metrics);
    }
    port.close();
    trace!("IO thread: loop exited");
}

/// RX 线程主循环
///
/// 只负责轮询、重组、解析和状态更新，与 TX 线程物理隔离。
pub fn rx_loop(
    mut rx: impl RxAdapter,
    ctx: Arc<EagleContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<EagleMetrics>,
) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("RX thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set RX thread priority: {:?}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let mut state = ReceiveState::new(&config);
    let poll_interval = config.poll_interval();

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        match rx.read_available() {
            Ok(chunk) if chunk.is_empty() => {
                metrics.rx_empty_polls.fetch_add(1, Ordering::Relaxed);
                spin_sleep::sleep(poll_interval);
            },
            Ok(chunk) => {
                process_chunk(&chunk, &mut state, &ctx, &metrics);
            },
            Err(e) => {
                if handle_read_error(&e, &mut state, &is_running, &metrics) {
                    break;
                }
                spin_sleep::sleep(poll_interval);
            },
        }
    }

    trace!("RX thread: loop exited");
}

/// TX 线程主循环（邮箱模式）
///
/// 优先级调度：实时邮箱优先于可靠队列。
///
/// # 参数
/// - `tx`: TX 适配器（只写）
/// - `realtime_slot`: 实时命令邮箱（新命令覆盖未发送的旧命令）
/// - `reliable_rx`: 可靠命令队列接收端（容量 10）
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `metrics`: 性能指标
pub fn tx_loop_mailbox(
    mut tx: impl TxAdapter,
    realtime_slot: Arc<Mutex<Option<RealtimeCommand>>>,
    reliable_rx: Receiver<EagleCommand>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<EagleMetrics>,
) {
    // 饿死保护：连续处理 N 个实时包后，强制检查一次可靠队列
    const REALTIME_BURST_LIMIT: usize = 100;
    // 两个队列都为空时的休眠时间，比接收轮询更短以保证 1 kHz 力控包及时写出
    const IDLE_SLEEP: Duration = Duration::from_micros(50);
    let mut realtime_burst_count = 0;
    let mut fatal = false;

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        // Priority 1: 实时邮箱（短作用域，锁立即释放）
        let realtime_command = realtime_slot.lock().take();

        if let Some(command) = realtime_command {
            // 整包一次写出
            match tx.write(&command.encode()) {
                Ok(()) => {
                    metrics
                        .tx_commands_total
                        .fetch_add(command.len() as u64, Ordering::Relaxed);
                },
                Err(e) => {
                    error!("TX thread: failed to send realtime package: {}", e);
                    metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                    if e.is_fatal() {
                        error!("TX thread: fatal error detected, setting is_running = false");
                        is_running.store(false, Ordering::Release);
                        fatal = true;
                        break;
                    }
                },
            }

            realtime_burst_count += 1;
            if realtime_burst_count < REALTIME_BURST_LIMIT {
                continue;
            }
            realtime_burst_count = 0;
        } else {
            realtime_burst_count = 0;
        }

        // Priority 2: 可靠命令队列
        match reliable_rx.try_recv() {
            Ok(command) => {
                if write_command(&mut |b: &[u8]| tx.write(b), &command, &is_running, &metrics) {
                    fatal = true;
                    break;
                }
                continue;
            },
            Err(TryRecvError::Disconnected) => {
                trace!("TX thread: reliable channel disconnected");
                break;
            },
            Err(TryRecvError::Empty) => {},
        }

        // 都没有数据，短暂休眠降低 CPU 占用
        spin_sleep::sleep(IDLE_SLEEP);
    }

    if !fatal {
        flush_reliable_on_exit(|b| tx.write(b), &reliable_rx, &metrics);
    }
    trace!("TX thread: loop exited");
}
