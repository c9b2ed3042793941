//! Judge verdict recovery.
//!
//! Verdicts arrive as structured fields, as JSON embedded in an agent's
//! output, or as loosely labeled prose. Recovery tries, in order:
//!
//! 1. structured fields on the event (or its `data` envelope)
//! 2. a JSON object in the output/text field, parsed whole, then from the
//!    outermost `{...}` substring
//! 3. a `label: value` scan of free text
//!
//! The first strategy that yields a `winner` value wins. A verdict whose
//! winner cannot be resolved to a side is discarded, never defaulted.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::model::{Debate, Judge, RubricScore, Side};
use super::stream::{DecodedEvent, StreamEvent};

static FIELD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(judge[ _]name|judge|winner[ _]weakness|winner|reasoning|weakness|quoted[ _]line|quote)\b["*]*\s*[:=]"#,
    )
    .expect("FIELD_LABEL regex should compile")
});

static LEFT_IDIOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:debater|side|speaker)[\s_-]*(?:1|one)\b|\baffirmative\b|\bpro\b")
        .expect("LEFT_IDIOM regex should compile")
});

static RIGHT_IDIOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:debater|side|speaker)[\s_-]*(?:2|two)\b|\bnegative\b|\bcon\b")
        .expect("RIGHT_IDIOM regex should compile")
});

/// Where a candidate's fields were recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictSource {
    Structured,
    EmbeddedJson,
    LabeledText,
}

/// Judge fields recovered from one event, before winner resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictCandidate {
    pub judge: Option<String>,
    pub winner: Option<String>,
    pub reasoning: Option<String>,
    pub quoted_line: Option<String>,
    pub rubric_score: Option<RubricScore>,
    pub source: VerdictSource,
}

impl VerdictCandidate {
    fn empty(source: VerdictSource) -> Self {
        Self {
            judge: None,
            winner: None,
            reasoning: None,
            quoted_line: None,
            rubric_score: None,
            source,
        }
    }

    fn has_winner(&self) -> bool {
        self.winner.is_some()
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

/// Parse `{category: [left, right]}` rubric scores, skipping malformed rows.
pub fn parse_rubric(value: &Value) -> Option<RubricScore> {
    let rows = value.as_object()?;
    let rubric: RubricScore = rows
        .iter()
        .filter_map(|(category, pair)| {
            let pair = pair.as_array()?;
            if pair.len() != 2 {
                return None;
            }
            let score = |v: &Value| {
                v.as_f64()
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .map(|n| n.round() as u32)
            };
            Some((category.clone(), [score(&pair[0])?, score(&pair[1])?]))
        })
        .collect();
    (!rubric.is_empty()).then_some(rubric)
}

fn candidate_from_object(map: &Map<String, Value>, source: VerdictSource) -> VerdictCandidate {
    VerdictCandidate {
        judge: clean(first_str(map, &["judge", "name", "judge_name", "judgeName"])),
        winner: clean(first_str(map, &["winner", "vote"])),
        reasoning: clean(first_str(map, &["reasoning", "reason"])),
        quoted_line: clean(first_str(
            map,
            &["quotedLine", "quoted_line", "quote", "winner_weakness", "weakness"],
        )),
        rubric_score: ["rubricScore", "rubric_score", "rubric"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(parse_rubric),
        source,
    }
}

fn structured_candidate(event: &StreamEvent) -> Option<VerdictCandidate> {
    let data = event.data.as_ref();

    let nested = [event.judge.as_ref(), data.and_then(|d| d.judge.as_ref())]
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(|map| candidate_from_object(map, VerdictSource::Structured))
        .find(VerdictCandidate::has_winner);
    if nested.is_some() {
        return nested;
    }

    let top = VerdictCandidate {
        judge: clean(event.judge.as_ref().and_then(Value::as_str)),
        winner: clean(event.winner.as_deref()),
        reasoning: clean(event.reasoning.as_deref()),
        quoted_line: clean(event.quoted_line.as_deref())
            .or_else(|| clean(event.winner_weakness.as_deref())),
        rubric_score: event.rubric_score.as_ref().and_then(parse_rubric),
        source: VerdictSource::Structured,
    };
    if top.has_winner() {
        return Some(top);
    }

    let data = data?;
    let enveloped = VerdictCandidate {
        judge: clean(data.judge.as_ref().and_then(Value::as_str)),
        winner: clean(data.winner.as_deref()),
        reasoning: clean(data.reasoning.as_deref()),
        quoted_line: clean(data.quoted_line.as_deref())
            .or_else(|| clean(data.winner_weakness.as_deref())),
        rubric_score: data.rubric_score.as_ref().and_then(parse_rubric),
        source: VerdictSource::Structured,
    };
    enveloped.has_winner().then_some(enveloped)
}

/// Parse a JSON object from text: whole text first, then the outermost
/// `{...}` substring.
pub fn parse_embedded_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(map);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn free_text(event: &StreamEvent) -> Option<&str> {
    event
        .output_text()
        .or_else(|| event.text.as_deref().filter(|t| !t.trim().is_empty()))
}

fn embedded_candidate(event: &StreamEvent) -> Option<VerdictCandidate> {
    if let Some(map) = event.output_object() {
        let candidate = candidate_from_object(map, VerdictSource::EmbeddedJson);
        if candidate.has_winner() {
            return Some(candidate);
        }
    }
    let map = parse_embedded_object(free_text(event)?)?;
    let candidate = candidate_from_object(&map, VerdictSource::EmbeddedJson);
    candidate.has_winner().then_some(candidate)
}

fn trim_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '*' | '{' | '}' | '`')
    });
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Scan free text for `label: value` pairs. Each value runs up to the next
/// recognized label. The first occurrence of each label is kept.
pub fn scan_labeled_fields(text: &str) -> VerdictCandidate {
    let mut candidate = VerdictCandidate::empty(VerdictSource::LabeledText);
    let labels: Vec<_> = FIELD_LABEL.captures_iter(text).collect();

    for (i, caps) in labels.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = labels
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |next| next.start());
        let value = trim_value(&text[whole.end()..end]);

        let label = label.as_str().to_ascii_lowercase().replace('_', " ");
        let slot = match label.as_str() {
            "judge" | "judge name" => &mut candidate.judge,
            "winner" => &mut candidate.winner,
            "reasoning" => &mut candidate.reasoning,
            _ => &mut candidate.quoted_line,
        };
        if slot.is_none() {
            *slot = value;
        }
    }
    candidate
}

/// Recover the verdict fields of one event. `None` when no strategy finds
/// a winner value.
pub fn extract_candidate(event: &StreamEvent) -> Option<VerdictCandidate> {
    if let Some(candidate) = structured_candidate(event) {
        return Some(candidate);
    }
    if let Some(candidate) = embedded_candidate(event) {
        return Some(candidate);
    }
    let candidate = scan_labeled_fields(free_text(event)?);
    candidate.has_winner().then_some(candidate)
}

/// Resolve a raw winner value to a side.
///
/// Accepted, in order: literal `left`/`right`; an exact debater name; a
/// debater name contained in the value, or the value being one word of a
/// name ("Grace" for "Grace Hopper"); position idioms (`debater 1`,
/// `side_2`, `affirmative`/`pro`, `negative`/`con`). A name match that
/// points at both sides resolves to nothing.
///
/// Name matches come before idioms, so with a debater named "Con Artist"
/// on the left, a bare "con" resolves to the left.
pub fn resolve_winner(raw: &str, debate: &Debate) -> Option<Side> {
    let value = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '.' | '!' | '*'))
        .trim()
        .to_lowercase();
    if value.is_empty() {
        return None;
    }

    match value.as_str() {
        "left" => return Some(Side::Left),
        "right" => return Some(Side::Right),
        _ => {}
    }

    let names: Vec<(Side, String)> = Side::ALL
        .into_iter()
        .map(|side| (side, debate.debater(side).name.trim().to_lowercase()))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    if let Some((side, _)) = names.iter().find(|(_, name)| *name == value) {
        return Some(*side);
    }

    let contained: Vec<Side> = names
        .iter()
        .filter(|(_, name)| {
            value.contains(name.as_str()) || name.split_whitespace().any(|word| word == value)
        })
        .map(|(side, _)| *side)
        .collect();
    if let [side] = contained.as_slice() {
        return Some(*side);
    }

    match (LEFT_IDIOM.is_match(&value), RIGHT_IDIOM.is_match(&value)) {
        (true, false) => Some(Side::Left),
        (false, true) => Some(Side::Right),
        _ => None,
    }
}

/// Build the deduplicated judge list from the events received so far.
///
/// Judges are keyed by (name, vote, reasoning, quoted line); repeats are
/// dropped. With no stream, or no valid verdict in it, the debate's static
/// judges are returned.
pub fn build_judges(debate: &Debate, events: Option<&[StreamEvent]>) -> Vec<Judge> {
    let Some(events) = events else {
        return debate.judges.clone();
    };

    let mut judges: Vec<Judge> = Vec::new();

    for event in events {
        if event.decode() != DecodedEvent::Verdict {
            continue;
        }
        let Some(candidate) = extract_candidate(event) else {
            debug!(agent = ?event.agent, "verdict event without a winner field");
            continue;
        };
        let winner = candidate.winner.as_deref().unwrap_or_default();
        let Some(vote) = resolve_winner(winner, debate) else {
            debug!(winner, "discarding verdict with unresolvable winner");
            continue;
        };

        let agent = event
            .agent
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());
        let ordinal = judges.len() + 1;
        let name = candidate
            .judge
            .clone()
            .or_else(|| agent.map(str::to_string))
            .unwrap_or_else(|| format!("Judge {}", ordinal));
        let title = match agent {
            Some(agent) if agent != name => agent.to_string(),
            _ => "Judge".to_string(),
        };
        let judge = Judge {
            id: ordinal as u32,
            name,
            title,
            vote,
            reasoning: candidate.reasoning.unwrap_or_default(),
            quoted_line: candidate.quoted_line.unwrap_or_default(),
            rubric_score: candidate.rubric_score,
        };
        if judges.iter().any(|j| j.dedup_key() == judge.dedup_key()) {
            debug!(judge = %judge.name, "dropping duplicate verdict");
            continue;
        }
        judges.push(judge);
    }

    if judges.is_empty() {
        return debate.judges.clone();
    }
    judges
}

#[cfg(test)]
mod tests {
    use super::super::model::fixtures::ada_vs_grace;
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> StreamEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resolve_winner_left_forms() {
        let debate = ada_vs_grace();
        for raw in ["left", "Ada", "Ada wins this round", "debater_1", "pro", "Debater 1", "affirmative"] {
            assert_eq!(resolve_winner(raw, &debate), Some(Side::Left), "{}", raw);
        }
    }

    #[test]
    fn test_resolve_winner_right_forms() {
        let debate = ada_vs_grace();
        for raw in ["Grace", "side_2", "con", "RIGHT", "\"grace\"", "negative"] {
            assert_eq!(resolve_winner(raw, &debate), Some(Side::Right), "{}", raw);
        }
    }

    #[test]
    fn test_resolve_winner_unresolvable() {
        let debate = ada_vs_grace();
        assert_eq!(resolve_winner("unknown person", &debate), None);
        assert_eq!(resolve_winner("", &debate), None);
        assert_eq!(resolve_winner("Ada and Grace tie", &debate), None);
        assert_eq!(resolve_winner("pro and con", &debate), None);
    }

    #[test]
    fn test_resolve_winner_first_name() {
        let mut debate = ada_vs_grace();
        debate.debaters.right.name = "Grace Hopper".to_string();
        assert_eq!(resolve_winner("Grace", &debate), Some(Side::Right));
        assert_eq!(resolve_winner("Grace Hopper, narrowly", &debate), Some(Side::Right));
    }

    #[test]
    fn test_resolve_winner_name_beats_idiom() {
        let mut debate = ada_vs_grace();
        debate.debaters.left.name = "Con Artist".to_string();
        assert_eq!(resolve_winner("Con Artist", &debate), Some(Side::Left));
        assert_eq!(resolve_winner("con", &debate), Some(Side::Left));
        assert_eq!(resolve_winner("negative", &debate), Some(Side::Right));
    }

    #[test]
    fn test_structured_fields() {
        let candidate = extract_candidate(&event(json!({
            "judge": "Logic",
            "winner": "Ada",
            "reasoning": "Sharper.",
            "winner_weakness": "Rushed ending.",
            "rubric_score": {"logic": [8, 6], "style": [7, "x"]}
        })))
        .unwrap();
        assert_eq!(candidate.source, VerdictSource::Structured);
        assert_eq!(candidate.judge.as_deref(), Some("Logic"));
        assert_eq!(candidate.quoted_line.as_deref(), Some("Rushed ending."));
        let rubric = candidate.rubric_score.unwrap();
        assert_eq!(rubric.get("logic"), Some(&[8, 6]));
        assert!(!rubric.contains_key("style"));
    }

    #[test]
    fn test_nested_judge_object() {
        let candidate = extract_candidate(&event(json!({
            "data": {"judge": {"name": "Persuasion", "vote": "Grace", "quotedLine": "Q"}}
        })))
        .unwrap();
        assert_eq!(candidate.judge.as_deref(), Some("Persuasion"));
        assert_eq!(candidate.winner.as_deref(), Some("Grace"));
        assert_eq!(candidate.quoted_line.as_deref(), Some("Q"));
    }

    #[test]
    fn test_embedded_json_strict_and_substring() {
        let strict = extract_candidate(&event(json!({
            "agent": "Logical Analyst Judge",
            "output": "{\"judge\": \"Logic\", \"winner\": \"Grace\", \"reasoning\": \"r\"}"
        })))
        .unwrap();
        assert_eq!(strict.source, VerdictSource::EmbeddedJson);
        assert_eq!(strict.winner.as_deref(), Some("Grace"));

        let wrapped = extract_candidate(&event(json!({
            "agent": "Persuasion Judge",
            "output": "Here is my verdict:\n```json\n{\"judge\": \"P\", \"winner\": \"Ada\"}\n```"
        })))
        .unwrap();
        assert_eq!(wrapped.source, VerdictSource::EmbeddedJson);
        assert_eq!(wrapped.winner.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_labeled_text_scan() {
        let text = "Judge: Strategist\nWinner: Grace.\nReasoning: Tighter rebuttals, weaker opener.\nWinner weakness: \"Too long\"";
        let candidate = scan_labeled_fields(text);
        assert_eq!(candidate.judge.as_deref(), Some("Strategist"));
        assert_eq!(candidate.winner.as_deref(), Some("Grace."));
        assert_eq!(
            candidate.reasoning.as_deref(),
            Some("Tighter rebuttals, weaker opener.")
        );
        assert_eq!(candidate.quoted_line.as_deref(), Some("Too long"));
    }

    #[test]
    fn test_no_winner_no_candidate() {
        assert!(extract_candidate(&event(json!({"agent": "Judge", "output": "I abstain."}))).is_none());
    }

    #[test]
    fn test_build_judges_dedups_and_drops_unresolvable() {
        let debate = ada_vs_grace();
        let verdict = json!({"judge": "Logic", "winner": "Ada", "reasoning": "r", "quotedLine": "q"});
        let events = vec![
            event(verdict.clone()),
            event(json!({"debater": "Ada", "text": "an argument"})),
            event(verdict),
            event(json!({"judge": "Chaos", "winner": "unknown person"})),
            event(json!({"agent": "Strategy Judge", "output": "Winner: side 2\nReasoning: calmer"})),
        ];
        let judges = build_judges(&debate, Some(events.as_slice()));
        assert_eq!(judges.len(), 2);
        assert_eq!(judges[0].id, 1);
        assert_eq!(judges[0].vote, Side::Left);
        assert_eq!(judges[1].id, 2);
        assert_eq!(judges[1].name, "Strategy Judge");
        assert_eq!(judges[1].title, "Judge");
        assert_eq!(judges[1].vote, Side::Right);
    }

    #[test]
    fn test_build_judges_falls_back_to_static() {
        let mut debate = ada_vs_grace();
        debate.judges = vec![Judge {
            id: 9,
            name: "Static".to_string(),
            title: "Judge".to_string(),
            vote: Side::Right,
            reasoning: String::new(),
            quoted_line: String::new(),
            rubric_score: None,
        }];
        let events = vec![event(json!({"judge": "Chaos", "winner": "nobody"}))];
        assert_eq!(build_judges(&debate, Some(events.as_slice())), debate.judges);
        assert_eq!(build_judges(&debate, None), debate.judges);
    }
}
