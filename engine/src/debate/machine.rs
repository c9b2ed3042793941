//! Phase state machine.
//!
//! ```text
//! intro ─START─▶ drawing ─DrawElapsed─▶ playing ─PlayElapsed─▶ speaking
//!                   ▲ │                                           │
//!                   │ │ drained                                   │
//!                   └─┼────── COMPLETE_ARGUMENT / NEXT_ROUND ─────┤
//!                     │                                           ▼ (last round ∧ finished)
//!                     └──────────────────────────────────▶ moderatorConclusion
//!                                                                 │ CONCLUDE
//!   complete ◀─CONCLUDE─ winnerAnnouncement ◀─VerdictElapsed─ judging
//! ```
//!
//! `drawing` waits for the argument at the current round. If the producer
//! has finished and every argument was already presented (the round index
//! is past the end), the debate is drained and the draw delay leads to
//! `moderatorConclusion` instead.
//!
//! The machine performs no I/O and never fails. Signals that do not apply to
//! the current phase are ignored. `SYNC_ARGUMENTS` and `SYNC_FINISHED` are
//! accepted in every phase and never change the phase themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cards::{add_card_if_missing, create_played_card, PlayedCard};
use super::model::{Argument, ConfidenceBySide, Debate, Side};

/// Phase of a staged debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DebatePhase {
    /// Waiting for `START`.
    Intro,
    /// Pause before the current round's card is revealed.
    Drawing,
    /// Card on the table.
    Playing,
    /// Argument text being presented.
    Speaking,
    /// Presenter wraps up; waiting for `CONCLUDE`.
    ModeratorConclusion,
    /// Judges deliberate; verdicts revealed one by one.
    Judging,
    /// Majority winner on display; waiting for `CONCLUDE`.
    WinnerAnnouncement,
    /// Terminal.
    Complete,
}

impl DebatePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Phases during which judge verdicts are being revealed.
    pub fn is_judging(self) -> bool {
        matches!(self, Self::Judging | Self::WinnerAnnouncement)
    }

    /// Valid transitions from this phase. Every phase but `intro` may be
    /// reset back to `intro`.
    pub fn valid_transitions(self) -> &'static [DebatePhase] {
        match self {
            Self::Intro => &[Self::Drawing],
            Self::Drawing => &[Self::Playing, Self::ModeratorConclusion, Self::Intro],
            Self::Playing => &[Self::Speaking, Self::Intro],
            Self::Speaking => &[Self::Drawing, Self::ModeratorConclusion, Self::Intro],
            Self::ModeratorConclusion => &[Self::Judging, Self::Intro],
            Self::Judging => &[Self::WinnerAnnouncement, Self::Intro],
            Self::WinnerAnnouncement => &[Self::Complete, Self::Intro],
            Self::Complete => &[Self::Intro],
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intro => write!(f, "intro"),
            Self::Drawing => write!(f, "drawing"),
            Self::Playing => write!(f, "playing"),
            Self::Speaking => write!(f, "speaking"),
            Self::ModeratorConclusion => write!(f, "moderatorConclusion"),
            Self::Judging => write!(f, "judging"),
            Self::WinnerAnnouncement => write!(f, "winnerAnnouncement"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Input to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebateSignal {
    Start,
    /// Drawing delay elapsed.
    DrawElapsed,
    /// Playing delay elapsed.
    PlayElapsed,
    /// Presentation of the current argument finished.
    CompleteArgument,
    /// Skip ahead from `speaking` without recording confidence.
    NextRound,
    Conclude,
    /// Verdict delay elapsed.
    VerdictElapsed,
    /// Latest mapper output.
    SyncArguments(Vec<Argument>),
    /// Upstream producer finished (or resumed).
    SyncFinished(bool),
}

impl std::fmt::Display for DebateSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::DrawElapsed => write!(f, "DRAW_ELAPSED"),
            Self::PlayElapsed => write!(f, "PLAY_ELAPSED"),
            Self::CompleteArgument => write!(f, "COMPLETE_ARGUMENT"),
            Self::NextRound => write!(f, "NEXT_ROUND"),
            Self::Conclude => write!(f, "CONCLUDE"),
            Self::VerdictElapsed => write!(f, "VERDICT_ELAPSED"),
            Self::SyncArguments(args) => write!(f, "SYNC_ARGUMENTS({})", args.len()),
            Self::SyncFinished(done) => write!(f, "SYNC_FINISHED({})", done),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: DebatePhase,
    pub to: DebatePhase,
    pub timestamp: DateTime<Utc>,
    /// Signal or action that caused the transition.
    pub reason: String,
}

/// What a `SYNC_ARGUMENTS` did to the argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Incoming list was shorter than the current one.
    Ignored,
    /// List replaced; `appended` new entries at the end.
    Applied { appended: usize },
}

/// The sole mutable aggregate of a debate session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineContext {
    pub debate: Debate,
    pub arguments: Vec<Argument>,
    /// `-1` before `START`.
    pub round_index: i64,
    pub left_cards: Vec<PlayedCard>,
    pub right_cards: Vec<PlayedCard>,
    pub confidence: ConfidenceBySide,
    pub revealed_judges: usize,
    pub is_debate_finished: bool,
}

impl MachineContext {
    fn new(debate: Debate, default_confidence: u8) -> Self {
        Self {
            debate,
            arguments: Vec::new(),
            round_index: -1,
            left_cards: Vec::new(),
            right_cards: Vec::new(),
            confidence: ConfidenceBySide::uniform(default_confidence),
            revealed_judges: 0,
            is_debate_finished: false,
        }
    }

    /// Current round as an index, `None` before `START`.
    pub fn current_round(&self) -> Option<usize> {
        usize::try_from(self.round_index).ok()
    }

    /// Argument at the current round, if it has arrived.
    pub fn current_argument(&self) -> Option<&Argument> {
        self.arguments.get(self.current_round()?)
    }

    pub fn cards(&self, side: Side) -> &[PlayedCard] {
        match side {
            Side::Left => &self.left_cards,
            Side::Right => &self.right_cards,
        }
    }

    fn cards_mut(&mut self, side: Side) -> &mut Vec<PlayedCard> {
        match side {
            Side::Left => &mut self.left_cards,
            Side::Right => &mut self.right_cards,
        }
    }

    /// Total cards on both sides.
    pub fn card_count(&self) -> usize {
        self.left_cards.len() + self.right_cards.len()
    }
}

/// Whether the current round is the last known one and the producer is done.
///
/// True only when `round_index == arguments.len() - 1`; an index past the
/// end is tolerated and reads as false.
pub fn is_last_round_and_finished(context: &MachineContext) -> bool {
    let last = context.arguments.len() as i64 - 1;
    context.is_debate_finished && context.round_index == last
}

/// Producer finished and no argument remains at or after the current round.
pub fn is_drained(context: &MachineContext) -> bool {
    context.is_debate_finished
        && context
            .current_round()
            .is_some_and(|round| round >= context.arguments.len())
}

/// Deterministic phase machine over a [`MachineContext`].
#[derive(Debug, Clone)]
pub struct DebateMachine {
    phase: DebatePhase,
    context: MachineContext,
    default_confidence: u8,
    transitions: Vec<PhaseTransition>,
}

impl DebateMachine {
    pub fn new(debate: Debate, default_confidence: u8) -> Self {
        Self {
            phase: DebatePhase::Intro,
            context: MachineContext::new(debate, default_confidence),
            default_confidence,
            transitions: Vec::new(),
        }
    }

    pub fn phase(&self) -> DebatePhase {
        self.phase
    }

    pub fn context(&self) -> &MachineContext {
        &self.context
    }

    /// Every phase change so far, oldest first.
    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// Feed one signal. Returns the transition if the phase changed.
    pub fn send(&mut self, signal: DebateSignal) -> Option<PhaseTransition> {
        let reason = signal.to_string();
        match (self.phase, signal) {
            (_, DebateSignal::SyncArguments(incoming)) => {
                self.sync_arguments(incoming);
                None
            }
            (_, DebateSignal::SyncFinished(done)) => {
                self.context.is_debate_finished = done;
                None
            }
            (DebatePhase::Intro, DebateSignal::Start) => {
                self.context.round_index = 0;
                Some(self.enter(DebatePhase::Drawing, &reason))
            }
            (DebatePhase::Drawing, DebateSignal::DrawElapsed) => {
                if self.context.current_argument().is_some() {
                    return Some(self.enter(DebatePhase::Playing, &reason));
                }
                if is_drained(&self.context) {
                    return Some(self.enter(DebatePhase::ModeratorConclusion, &reason));
                }
                debug!(round = self.context.round_index, "draw elapsed before argument arrived");
                None
            }
            (DebatePhase::Playing, DebateSignal::PlayElapsed) => {
                Some(self.enter(DebatePhase::Speaking, &reason))
            }
            (DebatePhase::Speaking, DebateSignal::CompleteArgument) => {
                self.record_confidence();
                Some(self.finish_round(&reason))
            }
            (DebatePhase::Speaking, DebateSignal::NextRound) => Some(self.finish_round(&reason)),
            (DebatePhase::ModeratorConclusion, DebateSignal::Conclude) => {
                Some(self.enter(DebatePhase::Judging, &reason))
            }
            (DebatePhase::Judging, DebateSignal::VerdictElapsed) => {
                Some(self.enter(DebatePhase::WinnerAnnouncement, &reason))
            }
            (DebatePhase::WinnerAnnouncement, DebateSignal::Conclude) => {
                Some(self.enter(DebatePhase::Complete, &reason))
            }
            (phase, signal) => {
                debug!(%phase, %signal, "signal ignored in current phase");
                None
            }
        }
    }

    /// Back to `intro`: round index, cards, confidence and revealed judges
    /// are cleared together. Arguments and the finished flag are kept.
    pub fn reset(&mut self) -> Option<PhaseTransition> {
        let context = &mut self.context;
        context.round_index = -1;
        context.left_cards.clear();
        context.right_cards.clear();
        context.confidence = ConfidenceBySide::uniform(self.default_confidence);
        context.revealed_judges = 0;

        if self.phase == DebatePhase::Intro {
            return None;
        }
        Some(self.enter(DebatePhase::Intro, "RESET"))
    }

    /// Whether a draw delay elapsing now would leave `drawing`.
    pub fn can_leave_drawing(&self) -> bool {
        self.context.current_argument().is_some() || is_drained(&self.context)
    }

    /// Reveal one more judge, up to `total`. Only while judging.
    pub fn reveal_judge(&mut self, total: usize) -> bool {
        if !self.phase.is_judging() || self.context.revealed_judges >= total {
            return false;
        }
        self.context.revealed_judges += 1;
        true
    }

    /// Cap the revealed judge count at `total` after the judge list shrank.
    pub fn clamp_revealed(&mut self, total: usize) -> bool {
        if self.context.revealed_judges <= total {
            return false;
        }
        self.context.revealed_judges = total;
        true
    }

    /// Apply a re-sync of the argument list.
    ///
    /// Shorter lists are ignored. Entries up to the current round are kept
    /// from the current list; only the tail comes from `incoming`.
    pub fn sync_arguments(&mut self, incoming: Vec<Argument>) -> SyncOutcome {
        let current = &self.context.arguments;
        if incoming.len() < current.len() {
            warn!(
                current = current.len(),
                incoming = incoming.len(),
                "ignoring shorter argument list"
            );
            return SyncOutcome::Ignored;
        }

        let consumed = (self.context.round_index + 1).max(0) as usize;
        let keep = consumed.min(current.len());
        if current[..keep] != incoming[..keep] {
            warn!(keep, "incoming arguments diverge from consumed rounds; keeping consumed");
        }

        let appended = incoming.len() - current.len();
        let mut merged = current[..keep].to_vec();
        merged.extend(incoming.into_iter().skip(keep));
        self.context.arguments = merged;
        SyncOutcome::Applied { appended }
    }

    fn record_confidence(&mut self) {
        let Some(argument) = self.context.current_argument() else {
            return;
        };
        let side = argument.debater_id;
        if let Some(value) = argument.confidence {
            self.context.confidence.set(side, value);
        }
    }

    fn finish_round(&mut self, reason: &str) -> PhaseTransition {
        if is_last_round_and_finished(&self.context) {
            return self.enter(DebatePhase::ModeratorConclusion, reason);
        }
        self.context.round_index += 1;
        self.enter(DebatePhase::Drawing, reason)
    }

    fn enter(&mut self, to: DebatePhase, reason: &str) -> PhaseTransition {
        let transition = PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        };
        self.transitions.push(transition.clone());
        self.phase = to;

        match to {
            DebatePhase::Playing => self.play_current_card(),
            DebatePhase::Judging => self.context.revealed_judges = 0,
            _ => {}
        }
        transition
    }

    fn play_current_card(&mut self) {
        let (Some(round), Some(argument)) =
            (self.context.current_round(), self.context.current_argument())
        else {
            return;
        };
        let card = create_played_card(
            argument,
            &self.context.debate,
            round,
            &self.context.confidence,
        );
        add_card_if_missing(self.context.cards_mut(card.side), card);
    }
}
