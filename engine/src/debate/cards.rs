//! Card ledger: played cards derived from arguments.

use serde::{Deserialize, Serialize};

use super::model::{Argument, CardType, ConfidenceBySide, Debate, Side};

/// Presentation-ready artifact for one round, keyed by round index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedCard {
    /// Stable id, `card-{round_index}`.
    pub id: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub text: String,
    pub speaker: String,
    pub side: Side,
    pub confidence: u8,
}

/// Deterministic card id for a round.
pub fn card_id(round_index: usize) -> String {
    format!("card-{}", round_index)
}

/// Display name of the debater in `side`.
pub fn side_speaker_name(debate: &Debate, side: Side) -> &str {
    &debate.debater(side).name
}

/// Materialize `argument` as the card for `round_index`.
///
/// The argument's own confidence wins; otherwise the side's current ledger
/// confidence is used.
pub fn create_played_card(
    argument: &Argument,
    debate: &Debate,
    round_index: usize,
    confidence: &ConfidenceBySide,
) -> PlayedCard {
    let side = argument.debater_id;
    PlayedCard {
        id: card_id(round_index),
        card_type: argument.card_type,
        text: argument.text.clone(),
        speaker: side_speaker_name(debate, side).to_string(),
        side,
        confidence: argument
            .confidence
            .unwrap_or_else(|| confidence.get(side)),
    }
}

/// Append `card` unless a card with the same id is already present.
///
/// Returns whether the card was added. Existing entries are never touched.
pub fn add_card_if_missing(cards: &mut Vec<PlayedCard>, card: PlayedCard) -> bool {
    if cards.iter().any(|existing| existing.id == card.id) {
        return false;
    }
    cards.push(card);
    true
}

#[cfg(test)]
mod tests {
    use super::super::model::fixtures::{ada_vs_grace, argument};
    use super::*;

    #[test]
    fn test_create_played_card() {
        let debate = ada_vs_grace();
        let mut ledger = ConfidenceBySide::default();
        ledger.set(Side::Right, 40);

        let card = create_played_card(&argument(Side::Right, "Counterpoint", None), &debate, 3, &ledger);
        assert_eq!(card.id, "card-3");
        assert_eq!(card.speaker, "Grace");
        assert_eq!(card.side, Side::Right);
        assert_eq!(card.confidence, 40);

        let card = create_played_card(&argument(Side::Left, "Point", Some(92)), &debate, 0, &ledger);
        assert_eq!(card.speaker, "Ada");
        assert_eq!(card.confidence, 92);
    }

    #[test]
    fn test_add_card_if_missing_is_idempotent() {
        let debate = ada_vs_grace();
        let ledger = ConfidenceBySide::default();
        let first = create_played_card(&argument(Side::Left, "One", None), &debate, 0, &ledger);
        let mut cards = Vec::new();

        assert!(add_card_if_missing(&mut cards, first.clone()));
        let snapshot = cards.clone();

        let mut replay = first;
        replay.text = "Edited".to_string();
        assert!(!add_card_if_missing(&mut cards, replay));
        assert_eq!(cards, snapshot);
    }

    #[test]
    fn test_ledger_keeps_first_seen_order() {
        let debate = ada_vs_grace();
        let ledger = ConfidenceBySide::default();
        let mut cards = Vec::new();
        for round in [0, 2, 2, 4, 0, 6] {
            let card = create_played_card(&argument(Side::Left, "x", None), &debate, round, &ledger);
            add_card_if_missing(&mut cards, card);
        }
        let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["card-0", "card-2", "card-4", "card-6"]);
    }

    #[test]
    fn test_card_serializes_type_field() {
        let debate = ada_vs_grace();
        let card = create_played_card(
            &argument(Side::Left, "x", None),
            &debate,
            0,
            &ConfidenceBySide::default(),
        );
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(json["type"], "attack");
        assert_eq!(json["side"], "left");
    }
}
