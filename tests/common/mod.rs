//! Shared harness: run a group on a helper thread and give up after a deadline.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use turnstile::{Rendezvous, RendezvousConfig, RendezvousError, RunReport};

/// Generous bound; a healthy run of these sizes takes milliseconds.
pub const DEADLINE: Duration = Duration::from_secs(30);

pub struct Outcome {
    pub result: Result<RunReport, RendezvousError>,
    pub lines: Vec<String>,
}

/// Labels `p0, p1, …` so emitted lines can be mapped back to ids.
pub fn numbered(participants: usize) -> Vec<String> {
    (0..participants).map(|id| format!("p{id}")).collect()
}

pub fn ids(lines: &[String]) -> Vec<usize> {
    lines
        .iter()
        .map(|line| line.strip_prefix('p').and_then(|id| id.parse().ok()).expect("numbered label"))
        .collect()
}

/// The round-robin cycle `0, 1, …, P-1, 0, …` truncated to `len`.
pub fn cycle(participants: usize, len: usize) -> Vec<usize> {
    (0..len).map(|turn| turn % participants).collect()
}

/// Runs `config` writing into `sink`; panics if it does not finish in time.
pub fn run_bounded_with<W>(config: RendezvousConfig, sink: W) -> Outcome
where
    W: Write + Send + Into<Vec<u8>> + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut group = Rendezvous::new(config, sink).expect("valid config");
        let result = group.run();
        let bytes: Vec<u8> = group.into_sink().into();
        let _ = tx.send((result, bytes));
    });

    let (result, bytes) = rx
        .recv_timeout(DEADLINE)
        .expect("rendezvous did not terminate in time (deadlock?)");
    let lines = String::from_utf8(bytes)
        .expect("utf-8 output")
        .lines()
        .map(str::to_owned)
        .collect();
    Outcome { result, lines }
}

pub fn run_bounded(config: RendezvousConfig) -> Outcome {
    run_bounded_with(config, Vec::new())
}

/// A sink that misbehaves on one particular line.
pub struct FlakySink {
    written: Vec<u8>,
    lines: usize,
    fail_at: usize,
    panic: bool,
}

impl FlakySink {
    /// Returns an I/O error instead of writing line `fail_at` (0-based).
    pub fn failing_at(fail_at: usize) -> Self {
        Self { written: Vec::new(), lines: 0, fail_at, panic: false }
    }

    /// Panics instead of writing line `fail_at` (0-based).
    pub fn panicking_at(fail_at: usize) -> Self {
        Self { panic: true, ..Self::failing_at(fail_at) }
    }
}

impl Write for FlakySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.lines == self.fail_at {
            if self.panic {
                panic!("sink exploded on line {}", self.lines);
            }
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        self.lines += buf.iter().filter(|&&b| b == b'\n').count();
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl From<FlakySink> for Vec<u8> {
    fn from(sink: FlakySink) -> Self {
        sink.written
    }
}
