//! Buffered process output.
//!
//! Application prints and diagnostic renderings go through an
//! [`OutputSink`]. Bytes are held in per-stream buffers and written out
//! when a buffer fills or when the exit path closes the sink. After
//! [`close`](OutputSink::close) further writes are discarded, so the final
//! flush happens exactly once.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Which stream a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

#[derive(Debug)]
enum Target {
    Process,
    Capture(Arc<Mutex<Captured>>),
}

/// Bytes written to a capturing sink.
#[derive(Debug, Default, Clone)]
pub struct Captured {
    /// Everything flushed to stdout.
    pub stdout: Vec<u8>,
    /// Everything flushed to stderr.
    pub stderr: Vec<u8>,
}

impl Captured {
    /// Stdout as lossy UTF-8.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as lossy UTF-8.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Debug)]
struct SinkInner {
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
    capacity: usize,
    target: Target,
    closed: AtomicBool,
}

/// Cloneable handle to the process's buffered output.
#[derive(Debug, Clone)]
pub struct OutputSink {
    inner: Arc<SinkInner>,
}

impl OutputSink {
    /// A sink writing to the real stdout/stderr.
    pub fn process(capacity: usize) -> Self {
        Self::with_target(capacity, Target::Process)
    }

    /// A sink collecting output in memory, plus the handle to read it.
    pub fn capture(capacity: usize) -> (Self, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let sink = Self::with_target(capacity, Target::Capture(Arc::clone(&captured)));
        (sink, captured)
    }

    fn with_target(capacity: usize, target: Target) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                stdout: Mutex::new(Vec::with_capacity(capacity)),
                stderr: Mutex::new(Vec::new()),
                capacity,
                target,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Appends `bytes` to `stream`.
    pub fn write(&self, stream: Stream, bytes: &[u8]) {
        if self.is_closed() {
            return;
        }
        let mut buffer = self.buffer(stream).lock();
        buffer.extend_from_slice(bytes);
        if buffer.len() >= self.inner.capacity {
            self.emit(stream, &mut buffer);
        }
    }

    /// Appends `line` and a newline to stdout.
    pub fn print(&self, line: &str) {
        self.write(Stream::Stdout, format!("{line}\n").as_bytes());
    }

    /// Appends `line` and a newline to stderr.
    pub fn eprint(&self, line: &str) {
        self.write(Stream::Stderr, format!("{line}\n").as_bytes());
    }

    /// Writes out both buffers.
    pub fn flush(&self) {
        self.emit(Stream::Stdout, &mut self.inner.stdout.lock());
        self.emit(Stream::Stderr, &mut self.inner.stderr.lock());
    }

    /// Flushes once more and stops accepting output.
    ///
    /// Returns `false` if the sink was already closed.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.flush();
        true
    }

    /// Whether the sink has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn buffer(&self, stream: Stream) -> &Mutex<Vec<u8>> {
        match stream {
            Stream::Stdout => &self.inner.stdout,
            Stream::Stderr => &self.inner.stderr,
        }
    }

    fn emit(&self, stream: Stream, buffer: &mut Vec<u8>) {
        if buffer.is_empty() {
            return;
        }
        match &self.inner.target {
            Target::Process => {
                // Nothing sensible can be done if the terminal is gone.
                let _ = match stream {
                    Stream::Stdout => {
                        let mut out = std::io::stdout().lock();
                        out.write_all(buffer).and_then(|()| out.flush())
                    }
                    Stream::Stderr => {
                        let mut err = std::io::stderr().lock();
                        err.write_all(buffer).and_then(|()| err.flush())
                    }
                };
            }
            Target::Capture(captured) => {
                let mut captured = captured.lock();
                match stream {
                    Stream::Stdout => captured.stdout.extend_from_slice(buffer),
                    Stream::Stderr => captured.stderr.extend_from_slice(buffer),
                }
            }
        }
        buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_held_until_flush() {
        let (sink, captured) = OutputSink::capture(1024);
        sink.print("should be output");
        assert!(captured.lock().stdout.is_empty());

        sink.flush();
        assert_eq!(captured.lock().stdout_text(), "should be output\n");
    }

    #[test]
    fn test_full_buffer_is_written_early() {
        let (sink, captured) = OutputSink::capture(4);
        sink.write(Stream::Stderr, b"abcdef");
        assert_eq!(captured.lock().stderr_text(), "abcdef");
    }

    #[test]
    fn test_close_flushes_once_and_discards_later_writes() {
        let (sink, captured) = OutputSink::capture(1024);
        sink.eprint("first");
        assert!(sink.close());
        assert!(!sink.close());

        sink.eprint("late");
        sink.flush();
        assert_eq!(captured.lock().stderr_text(), "first\n");
    }
}
