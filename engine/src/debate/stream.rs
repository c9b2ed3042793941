//! Inbound stream events and their tagged decode.
//!
//! The producer has shipped several event shapes over time: fields may sit
//! at the top level or under a `data` envelope, arguments may be objects or
//! bare strings, and confidence may be a number or a numeric string.
//! [`StreamEvent`] accepts all of them; [`StreamEvent::decode`] classifies an
//! event into exactly one [`DecodedEvent`] variant, checked in a fixed order:
//!
//! ```text
//! heartbeat → presenter cue → verdict → debate turn → unrecognized
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ArenaError, ArenaResult};

use super::model::MAX_CONFIDENCE;

/// Event names the producer has used for the presenter's opening.
pub const PRESENTER_INTRO_EVENTS: &[&str] = &[
    "moderator_intro_done",
    "presenter_intro_done",
    "moderator_introduction",
    "intro_done",
];

/// Event names the producer has used for the presenter's closing.
pub const PRESENTER_CONCLUSION_EVENTS: &[&str] = &[
    "moderator_conclusion_done",
    "presenter_conclusion_done",
    "moderator_conclusion",
    "conclusion_done",
];

/// Keep-alive event names.
pub const HEARTBEAT_EVENTS: &[&str] = &["ping", "heartbeat", "keepalive"];

static WINNER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)(^|[\s{,*"])winner["*]*\s*[:=]"#)
        .expect("WINNER_LABEL regex should compile")
});

/// Deserialize a field, mapping values of the wrong shape to `None`
/// instead of rejecting the whole event.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// The `data` envelope some producer versions wrap payloads in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventData {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub debater: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<Value>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<Value>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        alias = "quotedLine",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub quoted_line: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub winner_weakness: Option<String>,
    #[serde(alias = "rubricScore", skip_serializing_if = "Option::is_none")]
    pub rubric_score: Option<Value>,
}

/// One raw, loosely-typed message from the producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEvent {
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub debater: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    /// Object `{type, text, confidence}` or, in older producers, bare text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<Value>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
    /// Judge name, or a whole structured verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<Value>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(
        alias = "quotedLine",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub quoted_line: Option<String>,
    #[serde(deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub winner_weakness: Option<String>,
    #[serde(alias = "rubricScore", skip_serializing_if = "Option::is_none")]
    pub rubric_score: Option<Value>,
    /// Agent output: free text, JSON text, or an object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Which presenter moment an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenterCue {
    Intro,
    Conclusion,
    /// Any other message on the presenter channel.
    Remark,
}

/// Argument-like fields of an event, most specific location first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnPayload<'a> {
    pub debater: Option<&'a str>,
    pub text: Option<&'a str>,
    pub card_type: Option<&'a str>,
    pub confidence: Option<u8>,
}

/// Classification of a stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent<'a> {
    /// Keep-alive or an empty message.
    Heartbeat,
    /// Presenter/moderator channel.
    Presenter {
        cue: PresenterCue,
        text: Option<&'a str>,
    },
    /// Judge-shaped payload; see `verdict::extract_candidate`.
    Verdict,
    /// A debate turn carrying argument text.
    Turn(TurnPayload<'a>),
    /// Nothing recognizable.
    Unrecognized,
}

impl DecodedEvent<'_> {
    /// Whether this event belongs to the presenter channel.
    pub fn is_presenter(&self) -> bool {
        matches!(self, Self::Presenter { .. })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn object_str<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    non_empty(value?.as_object()?.get(key)?.as_str())
}

/// Interpret a number or numeric string as a 0–100 confidence.
pub fn confidence_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, f64::from(MAX_CONFIDENCE)) as u8)
}

fn object_confidence(value: Option<&Value>) -> Option<u8> {
    confidence_value(value?.as_object()?.get("confidence")?)
}

/// Whether free text reads like it contains a labeled `winner` field.
pub(crate) fn mentions_winner_label(text: &str) -> bool {
    WINNER_LABEL.is_match(text)
}

impl StreamEvent {
    /// Parse one JSON payload.
    pub fn from_json(payload: &str) -> ArenaResult<Self> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ArenaError::EmptyPayload);
        }
        Ok(serde_json::from_str(payload)?)
    }

    fn event_name(&self) -> Option<&str> {
        non_empty(self.event.as_deref())
    }

    fn data(&self) -> Option<&EventData> {
        self.data.as_ref()
    }

    /// `output` as text, preferring the `data` envelope.
    pub fn output_text(&self) -> Option<&str> {
        let nested = self.data().and_then(|d| d.output.as_ref());
        non_empty(nested.and_then(Value::as_str))
            .or_else(|| non_empty(self.output.as_ref().and_then(Value::as_str)))
    }

    /// `output` as a JSON object, preferring the `data` envelope.
    pub fn output_object(&self) -> Option<&serde_json::Map<String, Value>> {
        let nested = self.data().and_then(|d| d.output.as_ref());
        nested
            .and_then(Value::as_object)
            .or_else(|| self.output.as_ref().and_then(Value::as_object))
    }

    /// Whether any payload field is set at all.
    fn has_payload(&self) -> bool {
        self.debater.is_some()
            || self.data.is_some()
            || self.agent.is_some()
            || self.argument.is_some()
            || self.text.is_some()
            || self.output.is_some()
            || self.judge.is_some()
            || self.winner.is_some()
    }

    fn is_heartbeat(&self) -> bool {
        match self.event_name() {
            Some(name) if HEARTBEAT_EVENTS.iter().any(|h| h.eq_ignore_ascii_case(name)) => true,
            _ => !self.has_payload(),
        }
    }

    fn presenter_cue(&self) -> Option<PresenterCue> {
        if let Some(name) = self.event_name() {
            if PRESENTER_INTRO_EVENTS.contains(&name) {
                return Some(PresenterCue::Intro);
            }
            if PRESENTER_CONCLUSION_EVENTS.contains(&name) {
                return Some(PresenterCue::Conclusion);
            }
        }
        let agent = non_empty(self.agent.as_deref())
            .or_else(|| self.data().and_then(|d| non_empty(d.agent.as_deref())))?;
        let agent = agent.to_ascii_lowercase();
        (agent.contains("moderator") || agent.contains("presenter")).then_some(PresenterCue::Remark)
    }

    /// Text spoken on the presenter channel.
    pub fn presenter_text(&self) -> Option<&str> {
        self.output_text().or_else(|| non_empty(self.text.as_deref()))
    }

    /// Whether the event carries judge-shaped fields.
    pub fn is_judge_shaped(&self) -> bool {
        if self.judge.is_some() || self.winner.is_some() {
            return true;
        }
        if let Some(data) = self.data() {
            if data.judge.is_some() || data.winner.is_some() {
                return true;
            }
        }
        let judge_agent = [self.agent.as_deref(), self.data().and_then(|d| d.agent.as_deref())]
            .into_iter()
            .flatten()
            .any(|agent| agent.to_ascii_lowercase().contains("judge"));
        if judge_agent {
            return true;
        }
        if let Some(output) = self.output_object() {
            return output.contains_key("winner");
        }
        self.output_text().is_some_and(mentions_winner_label)
    }

    /// Argument-like fields, nested payload first.
    pub fn turn_payload(&self) -> TurnPayload<'_> {
        let data = self.data();
        let nested = data.and_then(|d| d.argument.as_ref());
        let flat = self.argument.as_ref();

        let debater = non_empty(self.debater.as_deref())
            .or_else(|| non_empty(self.agent.as_deref()))
            .or_else(|| data.and_then(|d| non_empty(d.debater.as_deref())))
            .or_else(|| non_empty(self.speaker.as_deref()));

        let text = object_str(nested, "text")
            .or_else(|| object_str(flat, "text"))
            .or_else(|| non_empty(flat.and_then(Value::as_str)))
            .or_else(|| non_empty(self.text.as_deref()));

        let card_type = object_str(nested, "type").or_else(|| object_str(flat, "type"));

        let confidence = object_confidence(nested)
            .or_else(|| object_confidence(flat))
            .or_else(|| self.confidence.as_ref().and_then(confidence_value));

        TurnPayload {
            debater,
            text,
            card_type,
            confidence,
        }
    }

    /// Classify this event. See the module docs for the check order.
    pub fn decode(&self) -> DecodedEvent<'_> {
        if self.is_heartbeat() {
            return DecodedEvent::Heartbeat;
        }
        if let Some(cue) = self.presenter_cue() {
            return DecodedEvent::Presenter {
                cue,
                text: self.presenter_text(),
            };
        }
        if self.is_judge_shaped() {
            return DecodedEvent::Verdict;
        }
        let payload = self.turn_payload();
        if payload.text.is_some() {
            return DecodedEvent::Turn(payload);
        }
        DecodedEvent::Unrecognized
    }
}

/// Parse one SSE message: the JSON `data` line plus the SSE event name,
/// which overrides any `event` field inside the payload.
pub fn parse_sse_message(data: &str, event_type: &str) -> ArenaResult<StreamEvent> {
    let mut event = StreamEvent::from_json(data)?;
    let event_type = event_type.trim();
    if !event_type.is_empty() {
        event.event = Some(event_type.to_string());
    }
    Ok(event)
}
