//! In-process capture of logwise records.
//!
//! Logs normally go to stderr. Clients attached over stdio can't see stderr,
//! so when capture is enabled every logwise record is also appended to a
//! [`LogBuffer`], which the [`ReadLogs`] tool pages through.
//!
//! Records logged before [`begin_capture`] are not available.

use crate::capability::{HandlerError, Tool};
use crate::content::Content;
use crate::schema::{Argument, ArgumentType, Arguments, InputSchema};
use logwise::{LogRecord, Logger};
use std::future::Future;
use std::pin::Pin;
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, Once, PoisonError};

static GLOBAL_BUFFER: LazyLock<LogBuffer> = LazyLock::new(LogBuffer::new);
static INSTALL: Once = Once::new();

const DEFAULT_LENGTH: usize = 10;

/// Records kept before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct Records {
    logs: VecDeque<String>,
    /// Position of `logs[0]`; grows as old records are dropped
    base: usize,
    capacity: usize,
}

impl Records {
    fn total(&self) -> usize {
        self.base + self.logs.len()
    }
}

/// A shared, bounded list of rendered log records.
///
/// Every record gets a position when it is pushed, counting from zero. Once
/// the buffer holds `capacity` records, each push drops the oldest one, but
/// positions never shift: a position keeps naming the same record for as
/// long as that record is retained.
///
/// ```
/// use capdispatch::capture::LogBuffer;
///
/// let buffer = LogBuffer::with_capacity(2);
/// for line in ["a", "b", "c"] {
///     buffer.push(line.to_string());
/// }
/// let page = buffer.page(Some(0), 10);
/// assert_eq!(page.logs, ["b", "c"]);
/// assert_eq!((page.start_pos, page.end_pos, page.all_logs), (1, 3, 3));
/// ```
#[derive(Debug, Clone)]
pub struct LogBuffer {
    records: Arc<Mutex<Records>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        LogBuffer::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        LogBuffer::default()
    }

    /// A buffer retaining at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        LogBuffer {
            records: Arc::new(Mutex::new(Records {
                logs: VecDeque::new(),
                base: 0,
                capacity: capacity.max(1),
            })),
        }
    }

    /// The buffer fed by [`begin_capture`].
    pub fn global() -> &'static LogBuffer {
        &GLOBAL_BUFFER
    }

    pub fn push(&self, log: String) {
        let mut records = self.lock();
        if records.logs.len() == records.capacity {
            records.logs.pop_front();
            records.base += 1;
        }
        records.logs.push_back(log);
    }

    /// Number of records currently retained.
    pub fn len(&self) -> usize {
        self.lock().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every retained record. Positions keep counting from where they were.
    pub fn clear(&self) {
        let mut records = self.lock();
        records.base = records.total();
        records.logs.clear();
    }

    /// Returns up to `length` records starting at position `start`, clamped
    /// to the retained range. With no `start`, returns the last `length`
    /// records.
    pub fn page(&self, start: Option<usize>, length: usize) -> LogPage {
        let records = self.lock();
        let total = records.total();
        let start_pos = start
            .unwrap_or_else(|| total.saturating_sub(length))
            .clamp(records.base, total);
        let end_pos = start_pos.saturating_add(length).min(total);
        LogPage {
            logs: records
                .logs
                .range(start_pos - records.base..end_pos - records.base)
                .cloned()
                .collect(),
            start_pos,
            end_pos,
            all_logs: total,
            first_pos: records.base,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        // a panic while holding the lock can't leave the records half-written
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One page of captured records, as returned by [`ReadLogs`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LogPage {
    pub logs: Vec<String>,
    pub start_pos: usize,
    pub end_pos: usize,
    /// Records ever pushed, including dropped ones
    pub all_logs: usize,
    /// Position of the oldest retained record
    pub first_pos: usize,
}

#[derive(Debug)]
struct CaptureLogger {
    buffer: LogBuffer,
}

impl Logger for CaptureLogger {
    fn finish_log_record(&self, record: LogRecord) {
        self.buffer.push(record.to_string());
    }

    fn finish_log_record_async<'s>(
        &'s self,
        record: LogRecord,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 's>> {
        Box::pin(async move { self.finish_log_record(record) })
    }

    fn prepare_to_die(&self) {}
}

/// Starts copying logwise records into [`LogBuffer::global`].
///
/// Only the first call installs the logger; later calls do nothing.
pub fn begin_capture() {
    INSTALL.call_once(|| {
        logwise::add_global_logger(Arc::new(CaptureLogger {
            buffer: LogBuffer::global().clone(),
        }));
        logwise::info_sync!("capture: log capture started");
    });
}

/// Tool that pages through captured log records.
#[derive(Debug, Clone)]
pub struct ReadLogs {
    buffer: LogBuffer,
}

impl ReadLogs {
    pub fn new(buffer: LogBuffer) -> Self {
        ReadLogs { buffer }
    }
}

impl Default for ReadLogs {
    fn default() -> Self {
        ReadLogs::new(LogBuffer::global().clone())
    }
}

impl Tool for ReadLogs {
    fn name(&self) -> &str {
        "read_logs"
    }

    fn description(&self) -> &str {
        "Reads log records captured by this server.

        Server logs are written to stderr, which stdio clients usually cannot see. When the
        server runs with log capture enabled, records are also kept in memory and can be read
        with this tool. Records made before capture began are not available."
    }

    fn input_schema(&self) -> InputSchema {
        InputSchema::new(vec![
            Argument::optional(
                "start_pos",
                ArgumentType::Integer,
                "The position to start reading logs from. If omitted, tails the logs.",
            ),
            Argument::optional(
                "length",
                ArgumentType::Integer,
                "The number of logs to read. Defaults to 10. Out-of-bounds ranges are clamped.",
            ),
        ])
    }

    fn call(&self, args: Arguments) -> Result<Vec<Content>, HandlerError> {
        let length = count_arg(&args, "length")?.unwrap_or(DEFAULT_LENGTH);
        let start = count_arg(&args, "start_pos")?;
        let page = self.buffer.page(start, length);
        let text = serde_json::to_string(&page).map_err(|e| HandlerError::new(e.to_string()))?;
        Ok(vec![text.into()])
    }
}

/// Reads a non-negative whole number, including one sent as `2.0`.
/// Absent and `null` both mean "use the default".
fn count_arg(args: &Arguments, name: &str) -> Result<Option<usize>, HandlerError> {
    let Some(value) = args.get(name).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
        .map(|n| Some(usize::try_from(n).unwrap_or(usize::MAX)))
        .ok_or_else(|| HandlerError::new(format!("`{name}` must be a non-negative integer, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn buffer_with(n: usize) -> LogBuffer {
        let buffer = LogBuffer::new();
        for i in 0..n {
            buffer.push(format!("line {i}"));
        }
        buffer
    }

    fn read(tool: &ReadLogs, args: serde_json::Value) -> serde_json::Value {
        let content = tool.call(serde_json::from_value(args).unwrap()).unwrap();
        serde_json::from_str(content[0].text()).unwrap()
    }

    #[test]
    fn tails_by_default() {
        let tool = ReadLogs::new(buffer_with(25));
        let page = read(&tool, json!({}));
        assert_eq!(page["start_pos"], 15);
        assert_eq!(page["end_pos"], 25);
        assert_eq!(page["logs"][0], "line 15");
        assert_eq!(page["all_logs"], 25);
    }

    #[test]
    fn explicit_range_is_clamped() {
        let tool = ReadLogs::new(buffer_with(5));
        let page = read(&tool, json!({"start_pos": 3, "length": 10}));
        assert_eq!(page["logs"], json!(["line 3", "line 4"]));

        let page = read(&tool, json!({"start_pos": 50}));
        assert_eq!(page["logs"], json!([]));
        assert_eq!(page["start_pos"], 5);
    }

    #[test]
    fn negative_arguments_are_rejected() {
        let tool = ReadLogs::new(buffer_with(5));
        let error = tool
            .call(serde_json::from_value(json!({"start_pos": -1})).unwrap())
            .unwrap_err();
        assert!(error.message().contains("`start_pos` must be a non-negative integer"));
        let error = tool
            .call(serde_json::from_value(json!({"length": -3})).unwrap())
            .unwrap_err();
        assert!(error.message().contains("`length`"));

        let page = read(&tool, json!({"start_pos": 1.0, "length": null}));
        assert_eq!(page["start_pos"], 1);
        assert_eq!(page["end_pos"], 5);
    }

    #[test]
    fn full_buffer_drops_oldest_and_keeps_positions() {
        let buffer = LogBuffer::with_capacity(4);
        for i in 0..10 {
            buffer.push(format!("line {i}"));
        }
        assert_eq!(buffer.len(), 4);

        let tool = ReadLogs::new(buffer.clone());
        let page = read(&tool, json!({"start_pos": 7, "length": 2}));
        assert_eq!(page["logs"], json!(["line 7", "line 8"]));

        let page = read(&tool, json!({"start_pos": 0, "length": 3}));
        assert_eq!(page["start_pos"], 6);
        assert_eq!(page["logs"], json!(["line 6", "line 7", "line 8"]));
        assert_eq!(page["first_pos"], 6);
        assert_eq!(page["all_logs"], 10);

        let page = read(&tool, json!({"length": 2}));
        assert_eq!(page["logs"], json!(["line 8", "line 9"]));

        buffer.clear();
        buffer.push("line 10".to_string());
        let page = buffer.page(None, DEFAULT_LENGTH);
        assert_eq!(page.logs, ["line 10"]);
        assert_eq!((page.start_pos, page.end_pos), (10, 11));
    }

    #[test]
    fn empty_buffer_reads_empty_page() {
        let page = LogBuffer::new().page(None, DEFAULT_LENGTH);
        assert!(page.logs.is_empty());
        assert_eq!(page.all_logs, 0);
    }

    #[test]
    fn clones_share_storage() {
        let buffer = LogBuffer::new();
        let other = buffer.clone();
        other.push("shared".to_string());
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert!(other.is_empty());
    }
}
