//! Debate domain model.
//!
//! Plain data shapes shared by the mapper, the card ledger, and the phase
//! machine. Field names serialize in camelCase because the presentation
//! layer consumes them as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};

/// Confidence every side starts with, and the fallback for turns that
/// carry no confidence of their own.
pub const DEFAULT_CONFIDENCE: u8 = 75;

/// Upper bound of the confidence scale.
pub const MAX_CONFIDENCE: u8 = 100;

/// A participant slot. Fixed for the lifetime of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, left first.
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// The other slot.
    pub fn opponent(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Strategic role of a played argument. Cosmetic, never structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    #[default]
    Attack,
    Defense,
    Counter,
    Evidence,
    Rhetoric,
    Framing,
    Clarification,
}

impl CardType {
    /// Every valid card type, in presentation order.
    pub const ALL: [CardType; 7] = [
        Self::Attack,
        Self::Defense,
        Self::Counter,
        Self::Evidence,
        Self::Rhetoric,
        Self::Framing,
        Self::Clarification,
    ];

    /// Parse a raw producer value. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|card_type| card_type.as_str().eq_ignore_ascii_case(raw))
    }

    /// Wire name of this card type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::Counter => "counter",
            Self::Evidence => "evidence",
            Self::Rhetoric => "rhetoric",
            Self::Framing => "framing",
            Self::Clarification => "clarification",
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display metadata for one debater. Immutable after setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debater {
    pub id: Side,
    pub name: String,
    pub title: String,
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideology: Option<String>,
}

/// Both debaters, keyed by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debaters {
    pub left: Debater,
    pub right: Debater,
}

/// The neutral presenter (moderator) of a debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presenter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_text: Option<String>,
}

/// Canonical, validated content of one debate turn.
///
/// Produced only by the event mapper (or supplied statically with the
/// debate); never mutated after creation. Its position in the argument list
/// is its round index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub debater_id: Side,
    pub text: String,
    #[serde(default)]
    pub card_type: CardType,
    /// Confidence reported with the turn (0–100), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

/// Per-category `[left, right]` rubric scores attached to a verdict.
pub type RubricScore = BTreeMap<String, [u32; 2]>;

/// One evaluator's resolved vote plus its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judge {
    pub id: u32,
    pub name: String,
    pub title: String,
    pub vote: Side,
    pub reasoning: String,
    pub quoted_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_score: Option<RubricScore>,
}

impl Judge {
    /// Identity used to suppress re-delivered verdicts.
    pub fn dedup_key(&self) -> (&str, Side, &str, &str) {
        (&self.name, self.vote, &self.reasoning, &self.quoted_line)
    }
}

/// Per-side confidence values shown next to each debater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBySide {
    pub left: u8,
    pub right: u8,
}

impl ConfidenceBySide {
    /// Both sides at the same value.
    pub fn uniform(value: u8) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    pub fn get(&self, side: Side) -> u8 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set(&mut self, side: Side, value: u8) {
        match side {
            Side::Left => self.left = value,
            Side::Right => self.right = value,
        }
    }
}

impl Default for ConfidenceBySide {
    fn default() -> Self {
        Self::uniform(DEFAULT_CONFIDENCE)
    }
}

/// A staged debate: topic, debaters, and any statically known content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debate {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presenter: Option<Presenter>,
    pub debaters: Debaters,
    /// Static arguments, used when no stream is attached.
    #[serde(default)]
    pub arguments: Vec<Argument>,
    /// Static judges, used when the stream yields no verdict.
    #[serde(default)]
    pub judges: Vec<Judge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rounds: Option<u32>,
}

impl Debate {
    /// Debater occupying `side`.
    pub fn debater(&self, side: Side) -> &Debater {
        match side {
            Side::Left => &self.debaters.left,
            Side::Right => &self.debaters.right,
        }
    }

    /// Side whose debater is named exactly `name`.
    pub fn side_of(&self, name: &str) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.debater(*side).name == name)
    }
}

/// Display metadata and stat block for a debater picked at setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebaterProfile {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideology: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, u32>,
}

impl DebaterProfile {
    fn into_debater(self, id: Side) -> Debater {
        Debater {
            id,
            name: self.name,
            title: self.title,
            avatar: self.avatar,
            ideology: self.ideology,
        }
    }
}

/// Setup input consumed once at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateSetup {
    pub debater1: DebaterProfile,
    pub debater2: DebaterProfile,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presenter: Option<Presenter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rounds: Option<u32>,
}

impl DebateSetup {
    /// Build the debate. `debater1` takes the left slot.
    ///
    /// Names must be non-empty and distinct: stream events identify their
    /// speaker by name only.
    pub fn into_debate(self) -> ArenaResult<Debate> {
        let left = self.debater1.name.trim();
        let right = self.debater2.name.trim();
        if left.is_empty() || right.is_empty() {
            return Err(ArenaError::InvalidSetup {
                message: "debater names must not be empty".to_string(),
            });
        }
        if left == right {
            return Err(ArenaError::InvalidSetup {
                message: format!("both debaters are named '{}'", left),
            });
        }

        Ok(Debate {
            topic: self.topic,
            presenter: self.presenter,
            debaters: Debaters {
                left: self.debater1.into_debater(Side::Left),
                right: self.debater2.into_debater(Side::Right),
            },
            arguments: Vec::new(),
            judges: Vec::new(),
            time_limit: None,
            total_rounds: self.total_rounds,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn debater(id: Side, name: &str) -> Debater {
        Debater {
            id,
            name: name.to_string(),
            title: format!("{} the debater", name),
            avatar: format!("/avatars/{}.png", name.to_lowercase()),
            ideology: None,
        }
    }

    /// "Ada" on the left, "Grace" on the right.
    pub fn ada_vs_grace() -> Debate {
        Debate {
            topic: "Should compilers be allowed to vote?".to_string(),
            presenter: None,
            debaters: Debaters {
                left: debater(Side::Left, "Ada"),
                right: debater(Side::Right, "Grace"),
            },
            arguments: Vec::new(),
            judges: Vec::new(),
            time_limit: None,
            total_rounds: None,
        }
    }

    pub fn argument(side: Side, text: &str, confidence: Option<u8>) -> Argument {
        Argument {
            debater_id: side,
            text: text.to_string(),
            card_type: CardType::Attack,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn profile(name: &str) -> DebaterProfile {
        DebaterProfile {
            name: name.to_string(),
            title: String::new(),
            avatar: String::new(),
            ideology: None,
            stats: BTreeMap::new(),
        }
    }

    #[test]
    fn test_card_type_parse() {
        assert_eq!(CardType::parse("rebuttal"), None);
        assert_eq!(CardType::parse("evidence"), Some(CardType::Evidence));
        assert_eq!(CardType::parse(" Framing "), Some(CardType::Framing));
        assert_eq!(CardType::parse(""), None);
    }

    #[test]
    fn test_side_of_exact_name() {
        let debate = ada_vs_grace();
        assert_eq!(debate.side_of("Ada"), Some(Side::Left));
        assert_eq!(debate.side_of("Grace"), Some(Side::Right));
        assert_eq!(debate.side_of("ada"), None);
        assert_eq!(debate.side_of("Linus"), None);
    }

    #[test]
    fn test_confidence_defaults_and_set() {
        let mut confidence = ConfidenceBySide::default();
        assert_eq!(confidence, ConfidenceBySide::uniform(75));
        confidence.set(Side::Right, 40);
        assert_eq!(confidence.get(Side::Right), 40);
        assert_eq!(confidence.get(Side::Left), 75);
    }

    #[test]
    fn test_setup_into_debate() {
        let setup = DebateSetup {
            debater1: profile("Ada"),
            debater2: profile("Grace"),
            topic: "Tabs or spaces".to_string(),
            presenter: None,
            total_rounds: Some(2),
        };
        let debate = setup.into_debate().unwrap();
        assert_eq!(debate.debaters.left.id, Side::Left);
        assert_eq!(debate.debaters.right.name, "Grace");
        assert_eq!(debate.total_rounds, Some(2));
        assert!(debate.arguments.is_empty());
    }

    #[test]
    fn test_setup_rejects_duplicate_names() {
        let setup = DebateSetup {
            debater1: profile("Ada"),
            debater2: profile("Ada"),
            topic: "Mirrors".to_string(),
            presenter: None,
            total_rounds: None,
        };
        let err = setup.into_debate().unwrap_err();
        assert!(err.to_string().contains("Ada"));
    }

    #[test]
    fn test_argument_serde_uses_camel_case() {
        let json = serde_json::to_value(argument(Side::Left, "hi", Some(80))).unwrap();
        assert_eq!(json["debaterId"], "left");
        assert_eq!(json["cardType"], "attack");
        assert_eq!(json["confidence"], 80);
    }
}
