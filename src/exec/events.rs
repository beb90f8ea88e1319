// src/exec/events.rs

//! Recognition of lifecycle markers in partial scanner output.
//!
//! The scanner writes one XML document to stdout, but the supervisor sees it
//! one line at a time. A line is usually not a well-formed document on its
//! own (`<nmaprun ...>` opens an element that is closed hundreds of lines
//! later, `</runstats>` closes one that was never seen), so every chunk is
//! tokenized independently and tokenizer errors simply end the scan of that
//! chunk. Only `quick_xml` errors are tolerated this way.
//!
//! Recognised elements:
//! - `<nmaprun start=".." version="..">` → [`Marker::RunStarted`]
//! - `<taskprogress percent=".." etc=".." task="..">` → [`Marker::Progress`]
//! - `<finished time=".." elapsed=".." summary=".." exit="..">` → [`Marker::RunFinished`]

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

/// Progress and timing information gathered while a scan runs.
///
/// Values are kept as the scanner printed them. Fields stay at their
/// defaults until the matching marker is seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Percent complete of the current scan phase, `"0"` to `"100"`.
    pub progress: String,
    /// Estimated time of completion (epoch seconds as printed).
    pub etc: String,
    /// Name of the scan phase the last progress report belongs to.
    pub task: String,
    pub start_time: String,
    pub end_time: String,
    pub elapsed: String,
    pub summary: String,
    /// `"success"` or `"error"` as reported by the finished marker.
    pub exit: String,
    pub version: String,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            progress: "0".to_string(),
            etc: "0".to_string(),
            task: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            elapsed: String::new(),
            summary: String::new(),
            exit: String::new(),
            version: String::new(),
        }
    }
}

/// A recognised lifecycle marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    RunStarted {
        start_time: String,
        version: String,
    },
    Progress {
        percent: String,
        etc: String,
        task: Option<String>,
    },
    RunFinished {
        end_time: String,
        elapsed: String,
        summary: String,
        exit: Option<String>,
    },
}

impl Marker {
    /// Overwrite the snapshot fields this marker carries.
    pub fn apply(&self, snapshot: &mut ProgressSnapshot) {
        match self {
            Marker::RunStarted {
                start_time,
                version,
            } => {
                snapshot.start_time = start_time.clone();
                snapshot.version = version.clone();
            }
            Marker::Progress { percent, etc, task } => {
                snapshot.progress = percent.clone();
                snapshot.etc = etc.clone();
                snapshot.task = task.clone().unwrap_or_default();
            }
            Marker::RunFinished {
                end_time,
                elapsed,
                summary,
                exit,
            } => {
                snapshot.end_time = end_time.clone();
                snapshot.elapsed = elapsed.clone();
                snapshot.summary = summary.clone();
                snapshot.exit = exit.clone().unwrap_or_default();
            }
        }
    }
}

/// Collect every marker in `chunk`, in document order.
///
/// Markers found before a tokenizer error are kept.
pub fn scan_markers(chunk: &str) -> Vec<Marker> {
    let mut reader = Reader::from_str(chunk);
    let mut markers = Vec::new();

    loop {
        let step = match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => marker_from_element(&e),
            Ok(Event::Eof) => break,
            Ok(_) => Ok(None),
            Err(e) => Err(e),
        };

        match step {
            Ok(Some(marker)) => markers.push(marker),
            Ok(None) => {}
            Err(e) => {
                trace!(error = %e, "chunk is not a complete markup fragment; skipping rest");
                break;
            }
        }
    }

    markers
}

/// Apply every marker in `chunk` to `snapshot`.
///
/// Returns whether at least one marker was recognised; an unrecognised or
/// malformed chunk leaves `snapshot` untouched.
pub fn extract_into(chunk: &str, snapshot: &mut ProgressSnapshot) -> bool {
    let markers = scan_markers(chunk);
    for marker in &markers {
        marker.apply(snapshot);
    }
    !markers.is_empty()
}

fn marker_from_element(e: &BytesStart<'_>) -> Result<Option<Marker>, quick_xml::Error> {
    let marker = match e.name().as_ref() {
        b"nmaprun" => {
            let mut attrs = attributes(e)?;
            match (attrs.remove("start"), attrs.remove("version")) {
                (Some(start_time), Some(version)) => Some(Marker::RunStarted {
                    start_time,
                    version,
                }),
                _ => None,
            }
        }
        b"taskprogress" => {
            let mut attrs = attributes(e)?;
            match (attrs.remove("percent"), attrs.remove("etc")) {
                (Some(percent), Some(etc)) => Some(Marker::Progress {
                    percent,
                    etc,
                    task: attrs.remove("task"),
                }),
                _ => None,
            }
        }
        b"finished" => {
            let mut attrs = attributes(e)?;
            match (
                attrs.remove("time"),
                attrs.remove("elapsed"),
                attrs.remove("summary"),
            ) {
                (Some(end_time), Some(elapsed), Some(summary)) => Some(Marker::RunFinished {
                    end_time,
                    elapsed,
                    summary,
                    exit: attrs.remove("exit"),
                }),
                _ => None,
            }
        }
        _ => None,
    };
    Ok(marker)
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.insert(key, value);
    }
    Ok(out)
}
