//! Eagle 驱动主 API 模块
//!
//! 提供 `Eagle` 结构体，启动后台 IO 线程并对外暴露命令发送和状态读取接口。

use crate::command::{CommandBuffer, CommandPriority, DriverCommand, RealtimeCommand};
use crate::error::DriverError;
use crate::metrics::{EagleMetrics, MetricsSnapshot};
use crate::pipeline::PipelineConfig;
use crate::state::{ActuatorRecord, ActuatorRegistry, EagleContext, RegistrySnapshot};
use crossbeam_channel::{Sender, TrySendError};
use eagle_protocol::{ActuatorId, EagleCommand};
use eagle_serial::{SerialAdapter, SplittableAdapter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 可靠命令队列容量
const RELIABLE_QUEUE_CAPACITY: usize = 10;

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，主线程只阻塞在 recv_timeout 上
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// Eagle 控制器驱动（对外 API）
///
/// 支持单线程和双线程两种模式
/// - 单线程模式：一个 `io_thread` 轮流收发，只支持可靠命令
/// - 双线程模式：`rx_thread` 和 `tx_thread` 物理隔离，额外支持实时邮箱
///
/// # 示例
///
/// ```no_run
/// use eagle_driver::EagleBuilder;
/// use std::time::Duration;
///
/// let eagle = EagleBuilder::new().port("/dev/ttyACM0").build()?;
/// eagle.handshake()?;
/// eagle.wait_for_handshake(Duration::from_millis(100))?;
/// eagle.enumerate()?;
/// # Ok::<(), eagle_driver::DriverError>(())
/// ```
pub struct Eagle {
    /// 可靠命令发送端（析构时先于 join 丢弃）
    reliable_tx: Option<Sender<EagleCommand>>,
    /// 实时命令邮箱（仅双线程模式）
    realtime_slot: Option<Arc<Mutex<Option<RealtimeCommand>>>>,
    ctx: Arc<EagleContext>,
    io_thread: Option<JoinHandle<()>>,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
    metrics: Arc<EagleMetrics>,
    port_name: String,
    baud_rate: u32,
    sleep_on_drop: bool,
    handshake_timeout: Duration,
}

impl Eagle {
    /// 最大允许的实时命令包大小
    ///
    /// 前 8 条存放在栈上，超出部分溢出到堆。
    pub const MAX_REALTIME_PACKAGE_SIZE: usize = 64;

    /// 创建单线程模式驱动
    ///
    /// # 参数
    /// - `port`: 串口适配器（未打开时自动打开）
    /// - `capacity`: 执行器槽位数（1..=256）
    /// - `config`: Pipeline 配置（`None` 使用默认值）
    pub fn new(
        mut port: impl SerialAdapter + Send + 'static,
        capacity: usize,
        config: Option<PipelineConfig>,
    ) -> Result<Self, DriverError> {
        let config = config.unwrap_or_default();
        let ctx = Arc::new(EagleContext::new(capacity, config.connection_timeout())?);

        if !port.is_open() {
            port.open()?;
        }

        let (reliable_tx, reliable_rx) = crossbeam_channel::bounded(RELIABLE_QUEUE_CAPACITY);
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(EagleMetrics::new());

        let io_thread = {
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            spawn(move || {
                crate::pipeline::io_loop(port, reliable_rx, ctx, config, is_running, metrics);
            })
        };

        debug!("Eagle driver started in single-thread mode ({} slots)", capacity);

        Ok(Self {
            reliable_tx: Some(reliable_tx),
            realtime_slot: None,
            ctx,
            io_thread: Some(io_thread),
            rx_thread: None,
            tx_thread: None,
            is_running,
            metrics,
            port_name: "unknown".to_string(),
            baud_rate: eagle_protocol::DEFAULT_BAUD_RATE,
            sleep_on_drop: true,
            handshake_timeout: Duration::from_millis(100),
        })
    }

    /// 创建双线程模式驱动
    ///
    /// RX 线程只做接收和状态更新，TX 线程按"实时邮箱优先、可靠队列次之"写出命令。
    pub fn new_dual_thread<C>(
        mut port: C,
        capacity: usize,
        config: Option<PipelineConfig>,
    ) -> Result<Self, DriverError>
    where
        C: SplittableAdapter + Send + 'static,
        C::RxAdapter: Send + 'static,
        C::TxAdapter: Send + 'static,
    {
        let config = config.unwrap_or_default();
        let ctx = Arc::new(EagleContext::new(capacity, config.connection_timeout())?);

        if !port.is_open() {
            port.open()?;
        }
        let (rx_adapter, tx_adapter) = port.split()?;

        let realtime_slot = Arc::new(Mutex::new(None::<RealtimeCommand>));
        let (reliable_tx, reliable_rx) = crossbeam_channel::bounded(RELIABLE_QUEUE_CAPACITY);
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(EagleMetrics::new());

        let rx_thread = {
            let ctx = ctx.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            spawn(move || {
                crate::pipeline::rx_loop(rx_adapter, ctx, config, is_running, metrics);
            })
        };

        let tx_thread = {
            let realtime_slot = realtime_slot.clone();
            let is_running = is_running.clone();
            let metrics = metrics.clone();
            spawn(move || {
                crate::pipeline::tx_loop_mailbox(
                    tx_adapter,
                    realtime_slot,
                    reliable_rx,
                    is_running,
                    metrics,
                );
            })
        };

        // 给 RX 线程一些启动时间，避免首个应答在轮询开始前到达
        std::thread::sleep(Duration::from_millis(10));

        debug!("Eagle driver started in dual-thread mode ({} slots)", capacity);

        Ok(Self {
            reliable_tx: Some(reliable_tx),
            realtime_slot: Some(realtime_slot),
            ctx,
            io_thread: None,
            rx_thread: Some(rx_thread),
            tx_thread: Some(tx_thread),
            is_running,
            metrics,
            port_name: "unknown".to_string(),
            baud_rate: eagle_protocol::DEFAULT_BAUD_RATE,
            sleep_on_drop: true,
            handshake_timeout: Duration::from_millis(100),
        })
    }

    pub(crate) fn with_metadata(mut self, port_name: String, baud_rate: u32) -> Self {
        self.port_name = port_name;
        self.baud_rate = baud_rate;
        self
    }

    pub(crate) fn with_sleep_on_drop(mut self, sleep_on_drop: bool) -> Self {
        self.sleep_on_drop = sleep_on_drop;
        self
    }

    pub(crate) fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    // ============================================================================
    // 状态读取
    // ============================================================================

    /// 获取单个执行器记录的副本（ID 越界返回 `None`）
    pub fn actuator(&self, id: ActuatorId) -> Option<ActuatorRecord> {
        self.ctx.registry.read().actuator(id).cloned()
    }

    /// 已枚举的执行器 ID（升序）
    pub fn available_actuators(&self) -> Vec<ActuatorId> {
        self.ctx.registry.read().available_actuators()
    }

    /// 最近一次处理的行产生的错误信息
    pub fn last_error(&self) -> Option<String> {
        self.ctx.registry.read().last_error().map(str::to_string)
    }

    pub fn is_port_confirmed(&self) -> bool {
        self.ctx.registry.read().is_port_confirmed()
    }

    /// 一次读锁内复制整张状态表
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.ctx.registry.read().snapshot()
    }

    /// 在读锁内执行闭包
    ///
    /// 闭包内看到的状态是一致的，但应尽快返回，避免阻塞 RX 线程的写入。
    ///
    /// ```no_run
    /// # use eagle_driver::EagleBuilder;
    /// # let eagle = EagleBuilder::new().port("/dev/ttyACM0").build()?;
    /// let total_force: i32 = eagle.read_registry(|r| {
    ///     r.actuators().iter().filter(|a| a.enumerated).map(|a| a.force).sum()
    /// });
    /// # Ok::<(), eagle_driver::DriverError>(())
    /// ```
    pub fn read_registry<R>(&self, f: impl FnOnce(&ActuatorRegistry) -> R) -> R {
        f(&self.ctx.registry.read())
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 在超时窗口内是否收到过控制器的任何完整行
    pub fn is_connected(&self) -> bool {
        self.ctx.connection_monitor.check_connection()
    }

    /// 驱动创建至今的时长
    pub fn connection_age(&self) -> Duration {
        self.ctx.connection_monitor.connection_age()
    }

    /// 检查线程健康状态
    ///
    /// # 返回
    /// - `(rx_alive, tx_alive)`：单线程模式下两者都反映 IO 线程的状态
    pub fn check_health(&self) -> (bool, bool) {
        let alive = |handle: &Option<JoinHandle<()>>| {
            handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
        };

        if self.io_thread.is_some() {
            let io_alive = alive(&self.io_thread);
            return (io_alive, io_alive);
        }
        (alive(&self.rx_thread), alive(&self.tx_thread))
    }

    pub fn is_healthy(&self) -> bool {
        let (rx_alive, tx_alive) = self.check_health();
        rx_alive && tx_alive && self.is_running.load(Ordering::Acquire)
    }

    pub fn is_dual_thread(&self) -> bool {
        self.realtime_slot.is_some()
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn capacity(&self) -> usize {
        self.ctx.registry.read().capacity()
    }

    // ============================================================================
    // 命令发送
    // ============================================================================

    /// 按优先级分发命令
    pub fn send_command(&self, command: DriverCommand) -> Result<(), DriverError> {
        match command.priority() {
            CommandPriority::RealtimeControl => self.send_realtime(command.command()),
            CommandPriority::ReliableCommand => self.send_reliable(command.command()),
        }
    }

    /// 发送单条实时命令（邮箱模式，覆盖未发送的旧命令）
    ///
    /// # 错误
    /// - `DriverError::NotDualThread`: 未使用双线程模式
    pub fn send_realtime(&self, command: EagleCommand) -> Result<(), DriverError> {
        self.send_realtime_command(RealtimeCommand::single(command))
    }

    /// 发送实时命令包（整包一次写出，整体覆盖）
    ///
    /// # 错误
    /// - `DriverError::NotDualThread`: 未使用双线程模式
    /// - `DriverError::InvalidInput`: 命令包为空或超过 `MAX_REALTIME_PACKAGE_SIZE`
    pub fn send_realtime_package(
        &self,
        commands: impl IntoIterator<Item = EagleCommand>,
    ) -> Result<(), DriverError> {
        let buffer: CommandBuffer = commands.into_iter().collect();

        if buffer.is_empty() {
            return Err(DriverError::InvalidInput(
                "Command package cannot be empty".to_string(),
            ));
        }
        if buffer.len() > Self::MAX_REALTIME_PACKAGE_SIZE {
            return Err(DriverError::InvalidInput(format!(
                "Command package too large: {} (max: {})",
                buffer.len(),
                Self::MAX_REALTIME_PACKAGE_SIZE
            )));
        }

        self.send_realtime_command(RealtimeCommand::package(buffer))
    }

    fn send_realtime_command(&self, command: RealtimeCommand) -> Result<(), DriverError> {
        let realtime_slot = self.realtime_slot.as_ref().ok_or(DriverError::NotDualThread)?;
        if !self.is_running.load(Ordering::Acquire) {
            return Err(DriverError::ChannelClosed);
        }

        let is_overwrite = {
            let mut slot = realtime_slot.lock();
            slot.replace(command).is_some()
        };

        // 指标在锁外更新
        if is_overwrite {
            let overwrites = self.metrics.tx_realtime_overwrites.fetch_add(1, Ordering::Relaxed) + 1;
            if overwrites % 1000 == 0 {
                let rate = self.metrics.snapshot().overwrite_rate();
                if rate > 50.0 {
                    warn!(
                        "High realtime overwrite rate: {:.1}% ({} overwrites), TX thread is falling behind",
                        rate, overwrites
                    );
                } else {
                    debug!("Realtime overwrites: {} ({:.1}%)", overwrites, rate);
                }
            }
        }

        Ok(())
    }

    /// 发送可靠命令（FIFO，不覆盖）
    ///
    /// # 错误
    /// - `DriverError::ChannelFull`: 队列已满（容量 10）
    /// - `DriverError::ChannelClosed`: IO 线程已退出
    pub fn send_reliable(&self, command: EagleCommand) -> Result<(), DriverError> {
        let reliable_tx = self.reliable_tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        if !self.is_running.load(Ordering::Acquire) {
            return Err(DriverError::ChannelClosed);
        }

        match reliable_tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.metrics.tx_reliable_drops.fetch_add(1, Ordering::Relaxed);
                Err(DriverError::ChannelFull)
            },
            Err(TrySendError::Disconnected(_)) => Err(DriverError::ChannelClosed),
        }
    }

    /// 发送握手命令（先清除旧的确认标志）
    pub fn handshake(&self) -> Result<(), DriverError> {
        self.ctx.registry.write().clear_port_confirmation();
        self.send_reliable(EagleCommand::Handshake)
    }

    /// 重新枚举执行器
    pub fn enumerate(&self) -> Result<(), DriverError> {
        self.send_reliable(EagleCommand::Enumerate)
    }

    /// 通知控制器执行器已回零，可以输出力
    pub fn system_ready(&self) -> Result<(), DriverError> {
        self.send_reliable(EagleCommand::SystemReady)
    }

    /// 向所有已枚举执行器发送休眠命令，返回发送的条数
    pub fn sleep_all(&self) -> Result<usize, DriverError> {
        let ids = self.available_actuators();
        for &id in &ids {
            self.send_reliable(EagleCommand::Sleep { id })?;
        }
        Ok(ids.len())
    }

    /// 等待握手应答
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍未收到 `]response`
    pub fn wait_for_handshake(&self, timeout: Duration) -> Result<(), DriverError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if self.is_port_confirmed() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if self.is_port_confirmed() {
            return Ok(());
        }
        Err(DriverError::Timeout)
    }

    /// 发送握手并在配置的超时内等待应答
    pub fn confirm_port(&self) -> Result<(), DriverError> {
        self.handshake()?;
        self.wait_for_handshake(self.handshake_timeout)?;
        info!("Eagle controller confirmed on {}", self.port_name);
        Ok(())
    }

    /// 析构时尽力下发休眠命令（不重试）
    fn sleep_enumerated_on_drop(&self) {
        let Some(reliable_tx) = self.reliable_tx.as_ref() else {
            return;
        };
        if !self.is_running.load(Ordering::Acquire) {
            return;
        }

        let ids = self.available_actuators();
        for id in ids {
            // 队列满时短暂等待 IO 线程腾出空间
            if let Err(e) = reliable_tx.send_timeout(EagleCommand::Sleep { id }, Duration::from_millis(20)) {
                warn!("Failed to queue sleep for actuator {} on drop: {}", id, e);
            }
        }
    }
}

impl Drop for Eagle {
    fn drop(&mut self) {
        if self.sleep_on_drop {
            self.sleep_enumerated_on_drop();
        }

        // Release: 之前入队的命令对看到 false 的线程可见，循环退出前会写出剩余命令
        self.is_running.store(false, Ordering::Release);

        // 必须在 join 之前丢弃发送端
        drop(self.reliable_tx.take());

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.rx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.tx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.io_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "IO thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}
