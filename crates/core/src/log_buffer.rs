//! Bounded per-job log buffer with broadcast fan-out.
//!
//! Each job owns one [`LogBuffer`]. The executor appends captured output
//! lines; any number of subscribers independently receive the full ordered
//! sequence. A late subscriber first replays the retained backlog, then
//! switches to live delivery: [`LogBuffer::subscribe`] performs the snapshot
//! and the broadcast subscription under the same lock as `append`, so the
//! handover has no gap and no duplicate.
//!
//! Retention is bounded to the most recent [`DEFAULT_RETAINED_LINES`] lines.
//! Once the terminal event is recorded the buffer accepts no further lines.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::job::JobStatus;

/// Retention cap on buffered lines per job.
pub const DEFAULT_RETAINED_LINES: usize = 10_000;

/// Terminal marker delivered to subscribers after the last line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminalEvent {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
}

/// One item on the live log channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Line { text: String },
    Terminal(TerminalEvent),
}

/// A replay-then-live log subscription.
pub struct LogSubscription {
    /// Lines produced before the subscription was taken, oldest first.
    pub backlog: Vec<String>,
    /// Terminal event, when the job had already finished at subscribe time.
    pub terminal: Option<TerminalEvent>,
    /// Live channel for lines produced after the subscription was taken.
    pub live: broadcast::Receiver<LogEvent>,
}

struct BufferState {
    lines: VecDeque<String>,
    capacity: usize,
    terminal: Option<TerminalEvent>,
}

/// Append-only, bounded log line buffer owned by a single job.
pub struct LogBuffer {
    state: Mutex<BufferState>,
    tx: broadcast::Sender<LogEvent>,
}

impl LogBuffer {
    /// Create a buffer retaining at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        // The broadcast channel matches the retention cap so a subscriber
        // that keeps up never observes a lagged receiver.
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self {
            state: Mutex::new(BufferState {
                lines: VecDeque::new(),
                capacity,
                terminal: None,
            }),
            tx,
        }
    }

    /// Append one output line and publish it to live subscribers.
    ///
    /// Ignored once the terminal event has been recorded.
    pub fn append(&self, line: impl Into<String>) {
        let line = line.into();
        let state = &mut *self.state.lock().expect("log buffer lock poisoned");
        if state.terminal.is_some() {
            return;
        }
        if state.lines.len() == state.capacity {
            state.lines.pop_front();
        }
        state.lines.push_back(line.clone());
        let _ = self.tx.send(LogEvent::Line { text: line });
    }

    /// Record the terminal event and publish it. Only the first call wins.
    pub fn terminate(&self, status: JobStatus, exit_code: Option<i32>) {
        let state = &mut *self.state.lock().expect("log buffer lock poisoned");
        if state.terminal.is_some() {
            return;
        }
        let event = TerminalEvent { status, exit_code };
        state.terminal = Some(event);
        let _ = self.tx.send(LogEvent::Terminal(event));
    }

    /// Take a replay-then-live subscription.
    pub fn subscribe(&self) -> LogSubscription {
        let state = self.state.lock().expect("log buffer lock poisoned");
        LogSubscription {
            backlog: state.lines.iter().cloned().collect(),
            terminal: state.terminal,
            live: self.tx.subscribe(),
        }
    }

    /// Snapshot of the retained lines; `tail` limits to the most recent N.
    pub fn snapshot(&self, tail: Option<usize>) -> Vec<String> {
        let state = self.state.lock().expect("log buffer lock poisoned");
        let skip = tail
            .map(|n| state.lines.len().saturating_sub(n))
            .unwrap_or(0);
        state.lines.iter().skip(skip).cloned().collect()
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.state.lock().expect("log buffer lock poisoned").lines.len()
    }

    /// Whether the buffer currently retains no lines.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_LINES)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_lines_are_retained_in_order() {
        let buf = LogBuffer::new(8);
        buf.append("one");
        buf.append("two");
        buf.append("three");
        assert_eq!(buf.snapshot(None), vec!["one", "two", "three"]);
    }

    #[test]
    fn retention_cap_drops_oldest_lines() {
        let buf = LogBuffer::new(3);
        for i in 0..5 {
            buf.append(format!("line-{i}"));
        }
        assert_eq!(buf.snapshot(None), vec!["line-2", "line-3", "line-4"]);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn tail_returns_most_recent_lines() {
        let buf = LogBuffer::new(8);
        for i in 0..5 {
            buf.append(format!("line-{i}"));
        }
        assert_eq!(buf.snapshot(Some(2)), vec!["line-3", "line-4"]);
        // A tail larger than the buffer returns everything.
        assert_eq!(buf.snapshot(Some(99)).len(), 5);
    }

    #[tokio::test]
    async fn subscriber_replays_backlog_then_receives_live_lines() {
        let buf = LogBuffer::new(8);
        buf.append("early");

        let mut sub = buf.subscribe();
        assert_eq!(sub.backlog, vec!["early"]);
        assert!(sub.terminal.is_none());

        buf.append("late");
        let event = sub.live.recv().await.expect("live line");
        assert!(matches!(event, LogEvent::Line { text } if text == "late"));
    }

    #[tokio::test]
    async fn multiple_subscribers_observe_the_same_sequence() {
        let buf = LogBuffer::new(8);
        let mut a = buf.subscribe();
        let mut b = buf.subscribe();

        buf.append("x");
        buf.append("y");
        buf.terminate(JobStatus::Completed, Some(0));

        for sub in [&mut a, &mut b] {
            let mut seen = Vec::new();
            loop {
                match sub.live.recv().await.expect("event") {
                    LogEvent::Line { text } => seen.push(text),
                    LogEvent::Terminal(t) => {
                        assert_eq!(t.status, JobStatus::Completed);
                        assert_eq!(t.exit_code, Some(0));
                        break;
                    }
                }
            }
            assert_eq!(seen, vec!["x", "y"]);
        }
    }

    #[test]
    fn late_subscriber_sees_terminal_in_snapshot() {
        let buf = LogBuffer::new(8);
        buf.append("done soon");
        buf.terminate(JobStatus::Failed, Some(2));

        let sub = buf.subscribe();
        assert_eq!(sub.backlog, vec!["done soon"]);
        assert_eq!(
            sub.terminal,
            Some(TerminalEvent {
                status: JobStatus::Failed,
                exit_code: Some(2),
            })
        );
    }

    #[test]
    fn appends_after_terminal_are_ignored() {
        let buf = LogBuffer::new(8);
        buf.terminate(JobStatus::Cancelled, None);
        buf.append("too late");
        assert!(buf.is_empty());
    }

    #[test]
    fn terminate_is_idempotent_first_call_wins() {
        let buf = LogBuffer::new(8);
        buf.terminate(JobStatus::Completed, Some(0));
        buf.terminate(JobStatus::Failed, Some(1));
        let sub = buf.subscribe();
        assert_eq!(
            sub.terminal,
            Some(TerminalEvent {
                status: JobStatus::Completed,
                exit_code: Some(0),
            })
        );
    }
}
