//! Presentation aggregates derived from machine state.

use serde::{Deserialize, Serialize};

use super::machine::{DebatePhase, MachineContext};
use super::model::{Judge, Side};

/// Read-only view of a debate. Recomputed from scratch on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateView {
    pub phase: DebatePhase,
    pub is_judging: bool,
    /// Majority vote, once the winner has been announced.
    pub winner: Option<Side>,
    /// 1-based round shown to viewers; 0 before the debate starts.
    pub round: u32,
    pub total_rounds: Option<u32>,
    pub revealed_judges: usize,
    pub judge_count: usize,
}

/// Majority side among `judges`. Ties and empty panels have no winner.
pub fn majority_vote(judges: &[Judge]) -> Option<Side> {
    let left = judges.iter().filter(|j| j.vote == Side::Left).count();
    let right = judges.len() - left;
    match left.cmp(&right) {
        std::cmp::Ordering::Greater => Some(Side::Left),
        std::cmp::Ordering::Less => Some(Side::Right),
        std::cmp::Ordering::Equal => None,
    }
}

/// Round number shown to viewers: two turns per round, clamped to
/// `total_rounds` when that is set.
pub fn display_round(round_index: i64, total_rounds: Option<u32>) -> u32 {
    if round_index < 0 {
        return 0;
    }
    let round = u32::try_from(round_index / 2 + 1).unwrap_or(u32::MAX);
    match total_rounds {
        Some(total) if total > 0 => round.min(total),
        _ => round,
    }
}

impl DebateView {
    pub fn derive(phase: DebatePhase, context: &MachineContext, judges: &[Judge]) -> Self {
        let announced = matches!(phase, DebatePhase::WinnerAnnouncement | DebatePhase::Complete);
        let total_rounds = context.debate.total_rounds;
        Self {
            phase,
            is_judging: phase.is_judging(),
            winner: if announced { majority_vote(judges) } else { None },
            round: display_round(context.round_index, total_rounds),
            total_rounds,
            revealed_judges: context.revealed_judges,
            judge_count: judges.len(),
        }
    }
}
