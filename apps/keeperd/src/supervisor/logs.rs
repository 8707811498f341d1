use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use keeper_core::proto::{LogLine, LogStream};
use tracing_subscriber::fmt::MakeWriter;

use super::now_millis;

/// Bounded in-memory tails of the server console and of the daemon's own log output.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<Mutex<Buffers>>,
}

struct Buffers {
    console: Ring,
    daemon: Ring,
    capacity: usize,
}

#[derive(Default)]
struct Ring {
    lines: VecDeque<LogLine>,
    evicted: bool,
}

impl Ring {
    fn push(&mut self, capacity: usize, entry: LogLine) {
        while self.lines.len() >= capacity {
            self.lines.pop_front();
            self.evicted = true;
        }
        self.lines.push_back(entry);
    }

    fn tail(&self, lines: usize) -> (Vec<LogLine>, bool) {
        let skip = self.lines.len().saturating_sub(lines);
        (
            self.lines.iter().skip(skip).cloned().collect(),
            skip > 0 || self.evicted,
        )
    }
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(100);
        Self {
            inner: Arc::new(Mutex::new(Buffers {
                console: Ring::default(),
                daemon: Ring::default(),
                capacity,
            })),
        }
    }

    pub fn push_console(&self, stream: LogStream, line: String) {
        let mut guard = self.lock();
        let capacity = guard.capacity;
        guard.console.push(capacity, entry(stream, line));
    }

    pub fn push_daemon(&self, line: String) {
        let mut guard = self.lock();
        let capacity = guard.capacity;
        guard.daemon.push(capacity, entry(LogStream::Stdout, line));
    }

    /// Last `lines` console lines, oldest first, and whether older lines were left out.
    pub fn tail_console(&self, lines: usize) -> (Vec<LogLine>, bool) {
        self.lock().console.tail(lines)
    }

    pub fn tail_daemon(&self, lines: usize) -> (Vec<LogLine>, bool) {
        self.lock().daemon.tail(lines)
    }

    pub fn daemon_writer(&self) -> LogWriterFactory {
        LogWriterFactory { store: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        // A panic while holding the lock cannot leave a VecDeque half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn entry(stream: LogStream, line: String) -> LogLine {
    LogLine {
        at_ms: now_millis(),
        stream,
        line,
    }
}

/// Tees formatted tracing output to stdout and into the daemon tail.
pub struct LogWriterFactory {
    store: LogStore,
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            store: self.store.clone(),
            pending: Vec::new(),
        }
    }
}

pub struct LogWriter {
    store: LogStore,
    pending: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if !line.is_empty() {
                self.store.push_daemon(line);
            }
        }

        io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}
