use chrono::Local;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::LoggingConfig;

/// A log entry with timestamp and message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S.%3f").to_string(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message,
        }
    }

    pub fn format_for_display(&self) -> String {
        format!(
            "[{}] {} [{}] {}",
            self.timestamp, self.level, self.target, self.message
        )
    }

    /// Parse one line of the compact fmt output: "LEVEL target: message"
    fn parse(line: &str) -> Self {
        const LEVELS: [(&str, Level); 5] = [
            ("TRACE ", Level::TRACE),
            ("DEBUG ", Level::DEBUG),
            ("INFO ", Level::INFO),
            ("WARN ", Level::WARN),
            ("ERROR ", Level::ERROR),
        ];

        let Some((level, rest)) = LEVELS.iter().find_map(|(prefix, level)| {
            line.strip_prefix(*prefix)
                .map(|rest| (*level, rest.trim_start()))
        }) else {
            return LogEntry::new(Level::INFO, "general", line.to_string());
        };

        match rest.split_once(':') {
            // a target never contains spaces
            Some((target, msg)) if !target.contains(' ') => {
                LogEntry::new(level, target, msg.trim().to_string())
            }
            _ => LogEntry::new(level, "general", rest.to_string()),
        }
    }
}

/// Thread-safe ring buffer of the most recent log entries
#[derive(Clone)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, entry: LogEntry) {
        // a poisoned buffer only loses log lines
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        while entries.len() >= self.capacity.max(1) {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => {
                let skip = entries.len().saturating_sub(count);
                entries.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writer that feeds formatted log lines into a [`LogRingBuffer`]
#[derive(Clone)]
pub struct RingBufferWriter {
    buffer: LogRingBuffer,
}

impl RingBufferWriter {
    pub fn new(buffer: LogRingBuffer) -> Self {
        Self { buffer }
    }
}

impl std::io::Write for RingBufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = std::str::from_utf8(buf) {
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                self.buffer.push(LogEntry::parse(line));
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RingBufferWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

static LOG_BUFFER: OnceLock<LogRingBuffer> = OnceLock::new();

/// The buffer installed by [`init_tracing`], if any
pub fn get_log_buffer() -> Option<LogRingBuffer> {
    LOG_BUFFER.get().cloned()
}

/// Initialize tracing with the ring buffer writer.
///
/// `RUST_LOG` wins over the configured level. Calling this again returns
/// the buffer from the first call.
pub fn init_tracing(config: &LoggingConfig) -> LogRingBuffer {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    if let Some(buffer) = get_log_buffer() {
        return buffer;
    }
    let buffer = LOG_BUFFER
        .get_or_init(|| LogRingBuffer::new(config.buffer_size))
        .clone();

    let fmt_layer = fmt::layer()
        .with_writer(RingBufferWriter::new(buffer.clone()))
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .without_time()
        .compact();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // another subscriber may already be global, e.g. under a test harness
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    tracing::info!(target: "system", "Tracing initialized at level {}", config.level);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let buffer = LogRingBuffer::new(2);
        for i in 0..3 {
            buffer.push(LogEntry::new(Level::INFO, "t", format!("m{}", i)));
        }
        let recent = buffer.get_recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "m1");
        assert_eq!(buffer.get_recent(1)[0].message, "m2");

        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_writer_parses_level_and_target() {
        let buffer = LogRingBuffer::new(10);
        let mut writer = RingBufferWriter::new(buffer.clone());
        writer
            .write_all(b" WARN filter: candidate fetch failed\nplain line\n")
            .unwrap();

        let entries = buffer.get_recent(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, "WARN");
        assert_eq!(entries[0].target, "filter");
        assert_eq!(entries[0].message, "candidate fetch failed");
        assert_eq!(entries[1].target, "general");
        assert!(entries[0].format_for_display().contains("[filter]"));
    }

    #[test]
    fn test_message_with_spaces_before_colon() {
        let entry = LogEntry::parse("INFO applied filter on 'x': done");
        assert_eq!(entry.target, "general");
        assert_eq!(entry.level, "INFO");
    }
}
