use std::{
    borrow::Cow,
    fmt::Display,
    io::{self, stderr, Write},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
pub use log::{debug, error, info, trace, warn, Level, LevelFilter, Record};
use log::{set_boxed_logger, set_max_level, Log, Metadata, SetLoggerError};
use time::{format_description::OwnedFormatItem, OffsetDateTime, UtcOffset};

pub mod appender;

use self::appender::FileAppender;
use crate::config::LogConfig;

#[cfg(target_family = "unix")]
pub(crate) fn local_timezone() -> UtcOffset
{
    UtcOffset::current_local_offset().unwrap_or_else(|_| {
                                         tz::TimeZone::local().ok()
                                                              .and_then(|tz| tz.find_current_local_time_type().ok().map(|t| t.ut_offset()))
                                                              .and_then(|secs| UtcOffset::from_whole_seconds(secs).ok())
                                                              .unwrap_or(UtcOffset::UTC)
                                     })
}

#[cfg(not(target_family = "unix"))]
pub(crate) fn local_timezone() -> UtcOffset
{
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// 日志时间戳的时区。出于性能考虑，本地时区只在构建日志器时获取一次。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogTimezone
{
    Local,
    Utc,
}

impl LogTimezone
{
    fn offset(&self) -> UtcOffset
    {
        match self {
            | LogTimezone::Local => local_timezone(),
            | LogTimezone::Utc => UtcOffset::UTC,
        }
    }
}

struct LogMsg
{
    time: OffsetDateTime,
    msg: Message,
}

impl LogMsg
{
    fn render(&self, offset: UtcOffset, time_format: &OwnedFormatItem) -> String
    {
        let time = self.time.to_offset(offset);
        let stamp = time.format(time_format).unwrap_or_else(|_| time.to_string());
        format!("[{}] {}\n", stamp, self.msg)
    }
}

enum LoggerInput
{
    LogMsg(LogMsg),
    Flush,
}

/// `LEVEL [file:line] message`，在调用线程中取出字段，到日志线程再格式化。
struct Message
{
    level: Level,
    file: Cow<'static, str>,
    line: Option<u32>,
    args: Cow<'static, str>,
}

impl Message
{
    #[inline]
    fn from_record(record: &Record) -> Self
    {
        Message { level: record.level(),
                  file: record.file_static()
                              .map(Cow::Borrowed)
                              .or_else(|| record.file().map(|s| Cow::Owned(s.to_owned())))
                              .unwrap_or(Cow::Borrowed("")),
                  line: record.line(),
                  args: record.args().as_str().map(Cow::Borrowed).unwrap_or_else(|| Cow::Owned(format!("{}", record.args()))) }
    }
}

impl Display for Message
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f,
               "{} [{}:{}] {}",
               self.level,
               self.file,
               self.line.unwrap_or(0),
               self.args)
    }
}

/// 释放时刷新日志的守卫，确保进程退出前所有日志都已写出。
pub struct LoggerGuard
{
    queue: Sender<LoggerInput>,
    notification: Receiver<io::Result<()>>,
}

impl Drop for LoggerGuard
{
    fn drop(&mut self)
    {
        if self.queue.send(LoggerInput::Flush).is_ok() {
            let _ = self.notification.recv();
        }
    }
}

pub struct Logger
{
    level: LevelFilter,
    queue: Sender<LoggerInput>,
    notification: Receiver<io::Result<()>>,
    block: bool,
    stopped: AtomicBool,
}

impl Logger
{
    pub fn init(self) -> Result<LoggerGuard, SetLoggerError>
    {
        let guard = LoggerGuard { queue: self.queue.clone(),
                                  notification: self.notification.clone() };
        set_max_level(self.level);
        set_boxed_logger(Box::new(self)).map(|_| guard)
    }
}

impl Log for Logger
{
    #[inline]
    fn enabled(&self, metadata: &Metadata) -> bool
    {
        self.level >= metadata.level()
    }

    fn log(&self, record: &Record)
    {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = LoggerInput::LogMsg(LogMsg { time: OffsetDateTime::now_utc(),
                                               msg: Message::from_record(record) });
        let sent = if self.block {
            self.queue.send(msg).is_ok()
        }
        else {
            // 队列满时丢弃
            !matches!(self.queue.try_send(msg), Err(TrySendError::Disconnected(_)))
        };
        if !sent && !self.stopped.swap(true, Ordering::SeqCst) {
            eprintln!("[OrderStat] : log queue closed while logging");
        }
    }

    fn flush(&self)
    {
        if self.queue.send(LoggerInput::Flush).is_ok() {
            let _ = self.notification.recv();
        }
    }
}

pub struct Builder
{
    level: LevelFilter,
    root: Box<dyn Write + Send>,
    channel_size: usize,
    block: bool,
    timezone: LogTimezone,
}

#[inline]
pub fn builder() -> Builder
{
    Builder::new()
}

impl Builder
{
    /// 默认：INFO 级别，输出到 stderr，本地时区，容量 100,000 的有界通道，满时丢弃。
    pub fn new() -> Builder
    {
        Builder { level: LevelFilter::Info,
                  root: Box::new(stderr()),
                  channel_size: 100_000,
                  block: false,
                  timezone: LogTimezone::Local }
    }

    pub fn max_log_level(mut self, level: LevelFilter) -> Builder
    {
        self.level = level;
        self
    }

    /// 日志输出目标，缺省为 stderr。
    pub fn root(mut self, writer: impl Write + Send + 'static) -> Builder
    {
        self.root = Box::new(writer);
        self
    }

    /// `block_when_full` 为真时，通道满会阻塞调用日志宏的线程；否则丢弃多余的日志。
    pub fn bounded(mut self, size: usize, block_when_full: bool) -> Builder
    {
        self.channel_size = size;
        self.block = block_when_full;
        self
    }

    pub fn utc(mut self) -> Builder
    {
        self.timezone = LogTimezone::Utc;
        self
    }

    pub fn local_timezone(mut self) -> Builder
    {
        self.timezone = LogTimezone::Local;
        self
    }

    /// 启动日志线程并返回日志器。
    pub fn build(self) -> io::Result<Logger>
    {
        let offset = self.timezone.offset();
        let time_format: OwnedFormatItem =
            time::format_description::parse_owned::<1>("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3][offset_hour sign:mandatory]")
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let (sender, receiver) = bounded::<LoggerInput>(self.channel_size);
        let (notification_sender, notification_receiver) = bounded(1);
        let mut root = self.root;

        std::thread::Builder::new().name("logger".to_string()).spawn(move || {
                                                                   let timeout = Duration::from_millis(200);
                                                                   loop {
                                                                       match receiver.recv_timeout(timeout) {
                                                                           | Ok(LoggerInput::LogMsg(msg)) => {
                                                                               if let Err(e) = root.write_all(msg.render(offset, &time_format).as_bytes()) {
                                                                                   eprintln!("[OrderStat] : logger failed to write message: {}", e);
                                                                               }
                                                                           }
                                                                           | Ok(LoggerInput::Flush) => {
                                                                               // 通道按顺序投递，Flush 之前的消息都已写出
                                                                               let _ = notification_sender.send(root.flush());
                                                                           }
                                                                           | Err(RecvTimeoutError::Timeout) => {
                                                                               let _ = root.flush();
                                                                           }
                                                                           | Err(RecvTimeoutError::Disconnected) => {
                                                                               let _ = root.flush();
                                                                               break;
                                                                           }
                                                                       }
                                                                   }
                                                               })?;

        Ok(Logger { level: self.level,
                    queue: sender,
                    notification: notification_receiver,
                    block: self.block,
                    stopped: AtomicBool::new(false) })
    }

    /// 构建并设置为全局日志器。
    pub fn try_init(self) -> Result<LoggerGuard, Box<dyn std::error::Error>>
    {
        let logger = self.build()?;
        Ok(logger.init()?)
    }
}

/// 按 `[log]` 配置初始化全局日志器：设置了 `file` 时以追加方式写入文件，否则写 stderr。
pub fn init_from_config(config: &LogConfig) -> Result<LoggerGuard, Box<dyn std::error::Error>>
{
    let builder = builder().max_log_level(config.level_filter()?).bounded(config.channel_size, config.block_when_full);
    let builder = if config.utc { builder.utc() } else { builder.local_timezone() };
    let builder = match &config.file {
        | Some(path) => builder.root(FileAppender::builder(path).build()?),
        | None => builder,
    };
    builder.try_init()
}

impl Default for Builder
{
    fn default() -> Self
    {
        Builder::new()
    }
}
