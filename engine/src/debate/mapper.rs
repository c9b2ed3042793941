//! Event mapper: stream events to canonical arguments and presenter text.
//!
//! Every function here is pure: the same event list always maps to the same
//! output, and a longer list maps to the same prefix plus new entries. The
//! phase machine relies on that to treat its argument list as append-only.

use tracing::debug;

use super::model::{Argument, CardType, Debate, DEFAULT_CONFIDENCE};
use super::stream::{DecodedEvent, PresenterCue, StreamEvent};

/// Text used when a turn event names a debater but carries no text.
pub const PLACEHOLDER_TEXT: &str = "...";

/// Map one event to an argument.
///
/// The speaking side is found by exact debater-name match; events naming
/// neither debater yield `None`. Unknown card types fall back to
/// [`CardType::Attack`], missing confidence to [`DEFAULT_CONFIDENCE`].
pub fn map_event_to_argument(event: &StreamEvent, debate: &Debate) -> Option<Argument> {
    let payload = event.turn_payload();
    let debater = payload.debater?;
    let Some(side) = debate.side_of(debater) else {
        debug!(debater, "dropping turn from unknown debater");
        return None;
    };

    Some(Argument {
        debater_id: side,
        text: payload.text.unwrap_or(PLACEHOLDER_TEXT).to_string(),
        card_type: payload
            .card_type
            .and_then(CardType::parse)
            .unwrap_or_default(),
        confidence: Some(payload.confidence.unwrap_or(DEFAULT_CONFIDENCE)),
    })
}

/// Build the ordered argument list from the events received so far.
///
/// Presenter, verdict, heartbeat and text-less events are skipped; the rest
/// are mapped in arrival order. With no stream attached (`None`) the
/// debate's static arguments are returned.
pub fn build_arguments(debate: &Debate, events: Option<&[StreamEvent]>) -> Vec<Argument> {
    let Some(events) = events else {
        return debate.arguments.clone();
    };

    events
        .iter()
        .filter(|event| matches!(event.decode(), DecodedEvent::Turn(_)))
        .filter_map(|event| map_event_to_argument(event, debate))
        .collect()
}

fn presenter_text(events: &[StreamEvent], wanted: PresenterCue) -> Option<String> {
    let decoded: Vec<_> = events.iter().map(StreamEvent::decode).collect();

    let named = decoded.iter().find_map(|event| match event {
        DecodedEvent::Presenter { cue, text } if *cue == wanted => Some(*text),
        _ => None,
    });
    if let Some(text) = named {
        return text.map(str::to_string);
    }

    let mut channel = decoded.iter().filter_map(|event| match event {
        DecodedEvent::Presenter { text, .. } => *text,
        _ => None,
    });
    let positional = match wanted {
        PresenterCue::Conclusion => channel.last(),
        _ => channel.next(),
    };
    positional.map(str::to_string)
}

/// Presenter opening: the named intro event, else the first presenter
/// message with text.
pub fn presenter_intro(events: &[StreamEvent]) -> Option<String> {
    presenter_text(events, PresenterCue::Intro)
}

/// Presenter closing: the named conclusion event, else the last presenter
/// message with text.
pub fn presenter_conclusion(events: &[StreamEvent]) -> Option<String> {
    presenter_text(events, PresenterCue::Conclusion)
}
