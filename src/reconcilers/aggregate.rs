//! Aggregation of per-container results into one report
//!
//! Each entry starts with a delimiter line carrying its position, its outcome
//! and the byte length of the block that follows:
//!
//! ```text
//! === entry 1/2 ok 35 ===
//! Container: web-0/web-1
//! output: hi
//!
//! ```
//!
//! The block keeps the `Container: ...\noutput: ...\n` layout. Output longer
//! than [`MAX_OUTPUT_BYTES`] is cut and followed by an `[output truncated]`
//! line. Failed entries add an `error: ...` line after the output. Because the
//! delimiter states the block length, [`split_report`] can recover every entry
//! even when command output contains text that looks like a delimiter.

use crate::adapters::pod_lister::ContainerIdentity;
use crate::adapters::remote_exec::{ExecFailure, ExecOutput};

/// Report rendered when nothing matched
pub const NO_CONTAINERS_MATCHED: &str = "No containers matched\n";

/// Largest per-container output kept in a report
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Line appended after output cut at `MAX_OUTPUT_BYTES`
pub const TRUNCATED_MARKER: &str = "[output truncated]";

const DELIMITER_PREFIX: &str = "=== entry ";
const DELIMITER_SUFFIX: &str = " ===";

/// Outcome of running the command in one matched container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub container: ContainerIdentity,
    pub stdout: String,
    pub error: Option<ExecFailure>,
}

impl ExecutionResult {
    pub fn new(container: ContainerIdentity, output: ExecOutput) -> Self {
        Self {
            container,
            stdout: output.stdout,
            error: output.error,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Rendered report plus counts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub text: String,
    pub matched: usize,
    pub failed: usize,
}

/// Render results in the given order
pub fn aggregate(results: &[ExecutionResult]) -> Report {
    if results.is_empty() {
        return Report {
            text: NO_CONTAINERS_MATCHED.to_string(),
            matched: 0,
            failed: 0,
        };
    }

    let total = results.len();
    let mut text = String::new();
    for (i, result) in results.iter().enumerate() {
        let block = render_block(result);
        let outcome = if result.succeeded() { "ok" } else { "failed" };
        text.push_str(&format!(
            "{}{}/{} {} {}{}\n",
            DELIMITER_PREFIX,
            i + 1,
            total,
            outcome,
            block.len(),
            DELIMITER_SUFFIX
        ));
        text.push_str(&block);
    }

    Report {
        text,
        matched: total,
        failed: results.iter().filter(|r| !r.succeeded()).count(),
    }
}

fn render_block(result: &ExecutionResult) -> String {
    let (stdout, truncated) = cap_output(&result.stdout);
    let mut block = format!("Container: {}\noutput: {}\n", result.container, stdout);
    if truncated {
        block.push_str(TRUNCATED_MARKER);
        block.push('\n');
    }
    if let Some(error) = &result.error {
        block.push_str(&format!("error: {}\n", error));
    }
    block
}

/// Cut output to `MAX_OUTPUT_BYTES` on a char boundary
fn cap_output(stdout: &str) -> (&str, bool) {
    if stdout.len() <= MAX_OUTPUT_BYTES {
        return (stdout, false);
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !stdout.is_char_boundary(end) {
        end -= 1;
    }
    (&stdout[..end], true)
}

/// One entry recovered from a report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportEntry {
    /// 1-based position in the report
    pub index: usize,
    pub succeeded: bool,
    /// `pod/container` as printed in the entry
    pub container: String,
    /// The full entry block, delimiter excluded
    pub block: String,
}

/// Error returned for text that is not a well-formed report
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed report: {0}")]
pub struct MalformedReport(pub String);

/// Split a report produced by [`aggregate`] back into its entries
pub fn split_report(report: &str) -> Result<Vec<ReportEntry>, MalformedReport> {
    if report == NO_CONTAINERS_MATCHED {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut rest = report;
    while !rest.is_empty() {
        let (header, after) = rest
            .split_once('\n')
            .ok_or_else(|| MalformedReport("unterminated delimiter line".to_string()))?;
        let (index, succeeded, len) = parse_delimiter(header)?;

        let block = after
            .get(..len)
            .ok_or_else(|| MalformedReport(format!("entry {} is truncated", index)))?;
        rest = &after[len..];

        let container = block
            .strip_prefix("Container: ")
            .and_then(|b| b.split_once('\n'))
            .map(|(c, _)| c.to_string())
            .ok_or_else(|| MalformedReport(format!("entry {} has no container line", index)))?;

        entries.push(ReportEntry {
            index,
            succeeded,
            container,
            block: block.to_string(),
        });
    }

    Ok(entries)
}

fn parse_delimiter(line: &str) -> Result<(usize, bool, usize), MalformedReport> {
    let malformed = || MalformedReport(format!("bad delimiter line '{}'", line));

    let fields = line
        .strip_prefix(DELIMITER_PREFIX)
        .and_then(|l| l.strip_suffix(DELIMITER_SUFFIX))
        .ok_or_else(malformed)?;

    let mut parts = fields.split(' ');
    let position = parts.next().ok_or_else(malformed)?;
    let outcome = parts.next().ok_or_else(malformed)?;
    let len = parts.next().ok_or_else(malformed)?;
    if parts.next().is_some() {
        return Err(malformed());
    }

    let index = position
        .split_once('/')
        .and_then(|(i, _)| i.parse::<usize>().ok())
        .ok_or_else(malformed)?;
    let succeeded = match outcome {
        "ok" => true,
        "failed" => false,
        _ => return Err(malformed()),
    };
    let len = len.parse::<usize>().map_err(|_| malformed())?;

    Ok((index, succeeded, len))
}
