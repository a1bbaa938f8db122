//! Event sources.
//!
//! Two background tasks feed the main loop over channels so it never blocks:
//! the terminal reader (keys, resizes, ticks) and the state-update reader,
//! which turns a JSON-lines stream into batches.

use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// High-level terminal events consumed by the application.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Tick,
}

/// Spawns a background task that polls the terminal for events and sends them
/// through the returned channel.
pub fn spawn_event_reader(tick_rate: Duration) -> mpsc::UnboundedReceiver<AppEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            // Poll with the tick rate so ticks keep flowing when idle.
            let has_event = event::poll(tick_rate).unwrap_or(false);
            if has_event {
                if let Ok(ev) = event::read() {
                    let app_event = match ev {
                        CtEvent::Key(k) if k.kind == KeyEventKind::Press => AppEvent::Key(k),
                        CtEvent::Resize(w, h) => AppEvent::Resize(w, h),
                        _ => continue,
                    };
                    if tx.send(app_event).is_err() {
                        break; // receiver dropped
                    }
                }
            } else if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    rx
}

// ───────────────────────────────────────── update stream ─────

/// Where state-update batches come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSource {
    Stdin,
    File(PathBuf),
}

impl UpdateSource {
    /// `-` means standard input.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            UpdateSource::Stdin
        } else {
            UpdateSource::File(PathBuf::from(arg))
        }
    }
}

#[derive(Debug)]
pub enum UpdateEvent {
    /// One line: a `name → state` object.
    Batch(Map<String, Value>),
    /// A line that is not a JSON object.  `line` is 1-based.
    Malformed { line: usize, error: String },
    /// End of stream (or the source could not be opened).
    Closed,
}

/// Spawns a task that reads JSON lines from `source` and forwards each as an
/// [`UpdateEvent`].  Blank lines are skipped.  The last event is always
/// [`UpdateEvent::Closed`].
pub fn spawn_update_reader(source: UpdateSource) -> mpsc::UnboundedReceiver<UpdateEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        match source {
            UpdateSource::Stdin => forward_lines(BufReader::new(tokio::io::stdin()), &tx).await,
            UpdateSource::File(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => forward_lines(BufReader::new(file), &tx).await,
                Err(e) => tracing::warn!("cannot open update stream {}: {e}", path.display()),
            },
        }
        let _ = tx.send(UpdateEvent::Closed);
    });

    rx
}

async fn forward_lines<R: AsyncBufRead + Unpin>(reader: R, tx: &mpsc::UnboundedSender<UpdateEvent>) {
    let mut lines = reader.lines();
    let mut line_no = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("update stream read failed: {e}");
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(parse_update_line(line_no, &line)).is_err() {
            break;
        }
    }
    tracing::debug!("update stream ended after {line_no} lines");
}

/// Parse one line of the update stream.
pub fn parse_update_line(line_no: usize, line: &str) -> UpdateEvent {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(batch)) => UpdateEvent::Batch(batch),
        Ok(other) => UpdateEvent::Malformed {
            line: line_no,
            error: format!("expected an object, got {}", kind_of(&other)),
        },
        Err(e) => UpdateEvent::Malformed {
            line: line_no,
            error: e.to_string(),
        },
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_parse_into_batches_or_errors() {
        assert!(matches!(parse_update_line(1, r#"{"w": {"liquids": []}}"#), UpdateEvent::Batch(b) if b.len() == 1));
        assert!(matches!(
            parse_update_line(2, "[1, 2]"),
            UpdateEvent::Malformed { line: 2, ref error } if error.contains("array")
        ));
        assert!(matches!(parse_update_line(3, "{oops"), UpdateEvent::Malformed { line: 3, .. }));
    }

    #[test]
    fn dash_means_stdin() {
        assert_eq!(UpdateSource::from_arg("-"), UpdateSource::Stdin);
        assert_eq!(UpdateSource::from_arg("u.jsonl"), UpdateSource::File("u.jsonl".into()));
    }

    #[tokio::test]
    async fn file_stream_ends_with_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("updates.jsonl");
        std::fs::write(&path, "{\"a\": {}}\n\nnot json\n{\"b\": {}}\n").unwrap();

        let mut rx = spawn_update_reader(UpdateSource::File(path));
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            let closed = matches!(ev, UpdateEvent::Closed);
            events.push(ev);
            if closed {
                break;
            }
        }
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], UpdateEvent::Batch(_)));
        assert!(matches!(events[1], UpdateEvent::Malformed { line: 3, .. }));
        assert!(matches!(events[2], UpdateEvent::Batch(_)));
        assert!(matches!(events[3], UpdateEvent::Closed));
    }

    #[tokio::test]
    async fn missing_file_just_closes() {
        let mut rx = spawn_update_reader(UpdateSource::File("/no/such/updates.jsonl".into()));
        assert!(matches!(rx.recv().await, Some(UpdateEvent::Closed)));
    }
}
