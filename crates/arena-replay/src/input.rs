//! Recorded stream and setup loading.
//!
//! A recording is either NDJSON (one event object per line) or SSE frames
//! (`event:` / `data:` lines separated by a blank line), as captured from
//! the producer's endpoint. Unparseable entries are skipped with a warning.

use std::path::Path;

use anyhow::{Context, Result};
use debate_engine::debate::parse_sse_message;
use debate_engine::{Debate, DebateSetup, EngineConfig, StreamEvent};
use tracing::warn;

/// Shape of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Ndjson,
    Sse,
}

impl InputFormat {
    /// SSE if the first meaningful line is an SSE field, else NDJSON.
    pub fn detect(text: &str) -> Self {
        let first = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with(':'));
        match first {
            Some(line) if line.starts_with("event:") || line.starts_with("data:") => Self::Sse,
            _ => Self::Ndjson,
        }
    }
}

/// Parse NDJSON: one event per non-empty line.
pub fn parse_ndjson(text: &str) -> Vec<StreamEvent> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match StreamEvent::from_json(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(line = i + 1, error = %e, "skipping unparseable event");
                None
            }
        })
        .collect()
}

fn flush_frame(events: &mut Vec<StreamEvent>, event_type: &mut String, data: &mut Vec<&str>) {
    if !data.is_empty() {
        let payload = data.join("\n");
        match parse_sse_message(&payload, event_type) {
            Ok(event) => events.push(event),
            Err(e) => warn!(event = %event_type, error = %e, "skipping unparseable frame"),
        }
    }
    event_type.clear();
    data.clear();
}

/// Parse SSE frames. Multiple `data:` lines in one frame are joined with
/// newlines; comment lines (`:`) are ignored.
pub fn parse_sse(text: &str) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut event_type = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            flush_frame(&mut events, &mut event_type, &mut data);
        } else if line.starts_with(':') {
            continue;
        } else if let Some(value) = line.strip_prefix("event:") {
            event_type = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    flush_frame(&mut events, &mut event_type, &mut data);

    events
}

/// Parse a recording in whichever format it is in.
pub fn parse_events(text: &str) -> Vec<StreamEvent> {
    match InputFormat::detect(text) {
        InputFormat::Ndjson => parse_ndjson(text),
        InputFormat::Sse => parse_sse(text),
    }
}

pub fn load_events(path: &Path) -> Result<Vec<StreamEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event recording {}", path.display()))?;
    Ok(parse_events(&text))
}

pub fn load_setup(path: &Path) -> Result<Debate> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read debate setup {}", path.display()))?;
    let setup: DebateSetup = serde_json::from_str(&text)
        .with_context(|| format!("invalid debate setup JSON in {}", path.display()))?;
    Ok(setup.into_debate()?)
}

/// Engine config from a JSON file, else from the environment.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::from_env());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read engine config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid engine config in {}", path.display()))
}
