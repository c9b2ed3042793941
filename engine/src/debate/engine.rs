//! Debate engine: the machine, its timers and the stream it reconciles.
//!
//! [`DebateEngine`] is the only mutation entry point for a session. It owns
//! the [`DebateMachine`], re-derives arguments and judges from the raw event
//! log on every sync, and arms scheduler timers for the delayed phases.
//!
//! Every tick carries the epoch it was armed in. The phase epoch is bumped on
//! each phase change, the reveal epoch whenever judge reveal restarts or
//! stops, and both on reset and shutdown. A tick from an older epoch is
//! dropped, so a leaked timer can never mutate state.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cards::{card_id, PlayedCard};
use super::machine::{DebateMachine, DebatePhase, DebateSignal, PhaseTransition, SyncOutcome};
use super::mapper::{build_arguments, presenter_conclusion, presenter_intro};
use super::model::{Argument, ConfidenceBySide, Debate, Judge, Side};
use super::scheduler::{CancelHandle, Scheduler, Tick, TimerKind};
use super::stream::StreamEvent;
use super::verdict::build_judges;
use super::view::DebateView;
use crate::config::EngineConfig;
use crate::session::SessionContext;

/// Revealed judge votes per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub left: u32,
    pub right: u32,
}

/// Orchestrates one debate session.
pub struct DebateEngine<S: Scheduler> {
    machine: DebateMachine,
    scheduler: S,
    config: EngineConfig,
    session: SessionContext,
    /// Raw event log; `None` until a stream is attached.
    events: Option<Vec<StreamEvent>>,
    judges: Vec<Judge>,
    selected_card: Option<String>,
    epoch: u64,
    reveal_epoch: u64,
    phase_timer: Option<CancelHandle>,
    reveal_timer: Option<CancelHandle>,
    /// Cleared by the first auto-start and by reset.
    auto_start_armed: bool,
    shut_down: bool,
}

impl<S: Scheduler> DebateEngine<S> {
    /// Create an engine for `debate`. Static arguments and judges on the
    /// debate are used until a stream is attached.
    pub fn new(debate: Debate, config: EngineConfig, session: SessionContext, scheduler: S) -> Self {
        let machine = DebateMachine::new(debate, config.default_confidence);
        let mut engine = Self {
            judges: machine.context().debate.judges.clone(),
            machine,
            scheduler,
            auto_start_armed: config.auto_start,
            config,
            session,
            events: None,
            selected_card: None,
            epoch: 0,
            reveal_epoch: 0,
            phase_timer: None,
            reveal_timer: None,
            shut_down: false,
        };

        let statics = build_arguments(engine.debate(), None);
        if !statics.is_empty() {
            engine.apply_arguments(statics);
        }
        engine
    }

    // ── Getters ──────────────────────────────────────────────────────────

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn debate(&self) -> &Debate {
        &self.machine.context().debate
    }

    pub fn phase(&self) -> DebatePhase {
        self.machine.phase()
    }

    pub fn round_index(&self) -> i64 {
        self.machine.context().round_index
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.machine.context().arguments
    }

    pub fn current_argument(&self) -> Option<&Argument> {
        self.machine.context().current_argument()
    }

    pub fn cards(&self, side: Side) -> &[PlayedCard] {
        self.machine.context().cards(side)
    }

    pub fn left_cards(&self) -> &[PlayedCard] {
        self.cards(Side::Left)
    }

    pub fn right_cards(&self) -> &[PlayedCard] {
        self.cards(Side::Right)
    }

    pub fn confidence(&self) -> ConfidenceBySide {
        self.machine.context().confidence
    }

    pub fn is_debate_finished(&self) -> bool {
        self.machine.context().is_debate_finished
    }

    pub fn judges(&self) -> &[Judge] {
        &self.judges
    }

    pub fn revealed_judges(&self) -> usize {
        self.machine.context().revealed_judges
    }

    /// Tally of the judges revealed so far.
    pub fn scores(&self) -> Scores {
        let revealed = self.revealed_judges().min(self.judges.len());
        self.judges[..revealed]
            .iter()
            .fold(Scores::default(), |mut scores, judge| {
                match judge.vote {
                    Side::Left => scores.left += 1,
                    Side::Right => scores.right += 1,
                }
                scores
            })
    }

    /// Side whose card is on the table (playing or speaking).
    pub fn active_side(&self) -> Option<Side> {
        if !matches!(self.phase(), DebatePhase::Playing | DebatePhase::Speaking) {
            return None;
        }
        self.current_argument().map(|a| a.debater_id)
    }

    /// Id of the card on the table (playing or speaking).
    pub fn active_card_id(&self) -> Option<String> {
        self.active_side()?;
        self.machine.context().current_round().map(card_id)
    }

    /// The card the viewer has opened, if any.
    pub fn selected_card(&self) -> Option<&PlayedCard> {
        let id = self.selected_card.as_deref()?;
        Side::ALL
            .into_iter()
            .flat_map(|side| self.cards(side))
            .find(|card| card.id == id)
    }

    /// Presenter opening from the stream, else the static presenter text.
    pub fn presenter_intro(&self) -> Option<String> {
        self.events
            .as_deref()
            .and_then(presenter_intro)
            .or_else(|| self.debate().presenter.as_ref()?.intro_text.clone())
    }

    /// Presenter closing from the stream, else the static presenter text.
    pub fn presenter_conclusion(&self) -> Option<String> {
        self.events
            .as_deref()
            .and_then(presenter_conclusion)
            .or_else(|| self.debate().presenter.as_ref()?.closing_text.clone())
    }

    /// Every phase change so far.
    pub fn transitions(&self) -> &[PhaseTransition] {
        self.machine.transitions()
    }

    /// Presentation aggregates for the current state.
    pub fn view(&self) -> DebateView {
        DebateView::derive(self.phase(), self.machine.context(), &self.judges)
    }

    // ── Actions ──────────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<PhaseTransition> {
        self.dispatch(DebateSignal::Start)
    }

    /// Leave `speaking` without recording the argument's confidence.
    pub fn next_round(&mut self) -> Option<PhaseTransition> {
        self.dispatch(DebateSignal::NextRound)
    }

    pub fn complete_argument(&mut self) -> Option<PhaseTransition> {
        self.dispatch(DebateSignal::CompleteArgument)
    }

    pub fn conclude(&mut self) -> Option<PhaseTransition> {
        self.dispatch(DebateSignal::Conclude)
    }

    /// Open a played card by id. Unknown ids are ignored.
    pub fn select_card(&mut self, id: &str) -> bool {
        let known = Side::ALL
            .into_iter()
            .any(|side| self.cards(side).iter().any(|card| card.id == id));
        if known {
            self.selected_card = Some(id.to_string());
        }
        known
    }

    pub fn clear_selection(&mut self) {
        self.selected_card = None;
    }

    /// Append one stream event and re-derive arguments and judges.
    pub fn ingest(&mut self, event: StreamEvent) -> Option<PhaseTransition> {
        if self.shut_down {
            return None;
        }
        self.events.get_or_insert_with(Vec::new).push(event);
        self.resync()
    }

    /// Replace the event log with `events` and re-derive.
    ///
    /// The log only grows: a list shorter than the current log is a stale
    /// snapshot and is ignored.
    pub fn sync_events(&mut self, events: &[StreamEvent]) -> Option<PhaseTransition> {
        if self.shut_down {
            return None;
        }
        let current = self.events.as_ref().map_or(0, Vec::len);
        if events.len() < current {
            warn!(
                session_id = %self.session.session_id,
                current,
                incoming = events.len(),
                "ignoring shorter event log"
            );
            return None;
        }
        self.events = Some(events.to_vec());
        self.resync()
    }

    /// Record whether the upstream producer has finished.
    pub fn sync_finished(&mut self, done: bool) {
        if self.shut_down {
            return;
        }
        self.machine.send(DebateSignal::SyncFinished(done));
        self.arm_stalled_draw();
    }

    /// Back to a manual `intro`. Round index, cards, confidence and
    /// revealed judges are cleared together and every pending timer is
    /// invalidated before this returns.
    pub fn reset(&mut self) -> Option<PhaseTransition> {
        if self.shut_down {
            return None;
        }
        self.invalidate_timers();
        self.selected_card = None;
        self.auto_start_armed = false;

        let transition = self.machine.reset();
        info!(
            session_id = %self.session.session_id,
            "debate reset"
        );
        transition
    }

    /// Tear down: cancel all timers. Later ticks and actions are no-ops.
    pub fn shutdown(&mut self) {
        self.invalidate_timers();
        self.shut_down = true;
        debug!(session_id = %self.session.session_id, "engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Deliver a scheduler tick. Stale ticks are dropped.
    pub fn handle_tick(&mut self, tick: Tick) -> Option<PhaseTransition> {
        if self.shut_down {
            debug!(kind = %tick.kind, "tick after shutdown");
            return None;
        }

        if tick.kind == TimerKind::JudgeReveal {
            if tick.epoch != self.reveal_epoch {
                debug!(kind = %tick.kind, epoch = tick.epoch, "stale tick");
                return None;
            }
            if self.machine.reveal_judge(self.judges.len()) {
                debug!(
                    session_id = %self.session.session_id,
                    revealed = self.revealed_judges(),
                    total = self.judges.len(),
                    "judge revealed"
                );
            }
            return None;
        }

        if tick.epoch != self.epoch {
            debug!(kind = %tick.kind, epoch = tick.epoch, "stale tick");
            return None;
        }
        self.phase_timer = None;
        let signal = match tick.kind {
            TimerKind::DrawToPlay => DebateSignal::DrawElapsed,
            TimerKind::PlayToSpeak => DebateSignal::PlayElapsed,
            TimerKind::Verdict => DebateSignal::VerdictElapsed,
            TimerKind::JudgeReveal => return None,
        };
        self.dispatch(signal)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn dispatch(&mut self, signal: DebateSignal) -> Option<PhaseTransition> {
        if self.shut_down {
            debug!(%signal, "signal after shutdown");
            return None;
        }
        let transition = self.machine.send(signal)?;
        self.on_transition(&transition);
        Some(transition)
    }

    fn resync(&mut self) -> Option<PhaseTransition> {
        let events = self.events.as_deref();
        let arguments = build_arguments(self.debate(), events);
        let judges = build_judges(self.debate(), events);

        self.apply_judges(judges);

        self.apply_arguments(arguments)
    }

    /// Swap in a re-derived judge list. Frozen once the winner is shown.
    fn apply_judges(&mut self, judges: Vec<Judge>) {
        if judges == self.judges {
            return;
        }
        if matches!(
            self.phase(),
            DebatePhase::WinnerAnnouncement | DebatePhase::Complete
        ) {
            debug!(
                session_id = %self.session.session_id,
                judges = judges.len(),
                "winner announced; judge list frozen"
            );
            return;
        }

        debug!(
            session_id = %self.session.session_id,
            judges = judges.len(),
            "judge list updated"
        );
        self.judges = judges;
        self.machine.clamp_revealed(self.judges.len());
        if self.phase().is_judging() {
            self.start_reveal();
        }
    }

    fn apply_arguments(&mut self, arguments: Vec<Argument>) -> Option<PhaseTransition> {
        if let SyncOutcome::Applied { appended } = self.machine.sync_arguments(arguments) {
            if appended > 0 {
                debug!(
                    session_id = %self.session.session_id,
                    appended,
                    total = self.arguments().len(),
                    "arguments synced"
                );
            }
        }

        if self.auto_start_armed
            && self.phase() == DebatePhase::Intro
            && !self.arguments().is_empty()
        {
            self.auto_start_armed = false;
            return self.start();
        }

        self.arm_stalled_draw();
        None
    }

    /// Arm the draw timer if `drawing` was waiting and can now proceed.
    fn arm_stalled_draw(&mut self) {
        if self.phase() == DebatePhase::Drawing
            && self.phase_timer.is_none()
            && self.machine.can_leave_drawing()
        {
            self.arm(TimerKind::DrawToPlay);
        }
    }

    fn on_transition(&mut self, transition: &PhaseTransition) {
        info!(
            session_id = %self.session.session_id,
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            round = self.round_index(),
            "phase transition"
        );

        self.epoch += 1;
        if let Some(timer) = self.phase_timer.take() {
            timer.cancel();
        }
        if !transition.to.is_judging() {
            self.stop_reveal();
        }

        match transition.to {
            DebatePhase::Drawing => self.arm_stalled_draw(),
            DebatePhase::Playing => self.arm(TimerKind::PlayToSpeak),
            DebatePhase::Judging => {
                self.arm(TimerKind::Verdict);
                self.start_reveal();
            }
            _ => {}
        }
    }

    fn arm(&mut self, kind: TimerKind) {
        let delays = &self.config.delays;
        let interval = match kind {
            TimerKind::DrawToPlay => delays.draw_to_play(),
            TimerKind::PlayToSpeak => delays.play_to_speak(),
            TimerKind::Verdict => delays.verdict_delay(),
            TimerKind::JudgeReveal => delays.judge_reveal(),
        };
        let tick = Tick {
            epoch: self.epoch,
            kind,
        };
        self.phase_timer = Some(self.scheduler.start(1, interval, tick));
    }

    /// (Re)start judge reveal for the judges not yet shown.
    fn start_reveal(&mut self) {
        self.stop_reveal();
        let remaining = self.judges.len().saturating_sub(self.revealed_judges());
        if remaining == 0 {
            return;
        }
        let tick = Tick {
            epoch: self.reveal_epoch,
            kind: TimerKind::JudgeReveal,
        };
        let count = u32::try_from(remaining).unwrap_or(u32::MAX);
        self.reveal_timer = Some(
            self.scheduler
                .start(count, self.config.delays.judge_reveal(), tick),
        );
    }

    fn stop_reveal(&mut self) {
        self.reveal_epoch += 1;
        if let Some(timer) = self.reveal_timer.take() {
            timer.cancel();
        }
    }

    fn invalidate_timers(&mut self) {
        self.epoch += 1;
        if let Some(timer) = self.phase_timer.take() {
            timer.cancel();
        }
        self.stop_reveal();
    }
}

impl<S: Scheduler> Drop for DebateEngine<S> {
    fn drop(&mut self) {
        self.invalidate_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::super::model::fixtures::ada_vs_grace;
    use super::super::scheduler::ManualScheduler;
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn event(value: serde_json::Value) -> StreamEvent {
        serde_json::from_value(value).unwrap()
    }

    fn engine(config: EngineConfig) -> (DebateEngine<ManualScheduler>, ManualScheduler) {
        let sched = ManualScheduler::new();
        let engine = DebateEngine::new(ada_vs_grace(), config, SessionContext::anonymous(), sched.clone());
        (engine, sched)
    }

    fn run_for(engine: &mut DebateEngine<ManualScheduler>, sched: &ManualScheduler, ms: u64) {
        for _ in 0..ms / 100 {
            for tick in sched.advance(Duration::from_millis(100)) {
                engine.handle_tick(tick);
            }
        }
    }

    #[test]
    fn test_auto_start_waits_for_first_argument() {
        let (mut engine, _) = engine(EngineConfig::default());
        engine.ingest(event(json!({"event": "moderator_intro_done", "data": {"output": "Welcome"}})));
        assert_eq!(engine.phase(), DebatePhase::Intro);
        assert_eq!(engine.presenter_intro().as_deref(), Some("Welcome"));

        let t = engine.ingest(event(json!({"debater": "Ada", "text": "First"}))).unwrap();
        assert_eq!(t.to, DebatePhase::Drawing);
        assert_eq!(engine.round_index(), 0);
    }

    #[test]
    fn test_manual_start_when_auto_start_disabled() {
        let config = EngineConfig {
            auto_start: false,
            ..EngineConfig::default()
        };
        let (mut engine, _) = engine(config);
        engine.ingest(event(json!({"debater": "Ada", "text": "First"})));
        assert_eq!(engine.phase(), DebatePhase::Intro);
        assert!(engine.start().is_some());
    }

    #[test]
    fn test_active_card_and_selection() {
        let (mut engine, sched) = engine(EngineConfig::default());
        engine.ingest(event(json!({"debater": "Grace", "text": "Opening"})));
        assert_eq!(engine.active_side(), None);

        run_for(&mut engine, &sched, 1000);
        assert_eq!(engine.phase(), DebatePhase::Playing);
        assert_eq!(engine.active_side(), Some(Side::Right));
        assert_eq!(engine.active_card_id().as_deref(), Some("card-0"));

        assert!(!engine.select_card("card-9"));
        assert!(engine.select_card("card-0"));
        assert_eq!(engine.selected_card().map(|c| c.speaker.as_str()), Some("Grace"));
        engine.clear_selection();
        assert!(engine.selected_card().is_none());
    }

    #[test]
    fn test_static_debate_runs_without_stream() {
        let mut debate = ada_vs_grace();
        debate.arguments = vec![super::super::model::fixtures::argument(Side::Left, "Static", Some(90))];
        let sched = ManualScheduler::new();
        let mut engine = DebateEngine::new(debate, EngineConfig::default(), SessionContext::anonymous(), sched.clone());
        assert_eq!(engine.phase(), DebatePhase::Drawing);

        run_for(&mut engine, &sched, 2000);
        assert_eq!(engine.phase(), DebatePhase::Speaking);
        engine.sync_finished(true);
        engine.complete_argument();
        assert_eq!(engine.phase(), DebatePhase::ModeratorConclusion);
        assert_eq!(engine.confidence().left, 90);
    }

    #[test]
    fn test_shutdown_makes_everything_a_no_op() {
        let (mut engine, sched) = engine(EngineConfig::default());
        engine.ingest(event(json!({"debater": "Ada", "text": "First"})));
        engine.shutdown();
        assert_eq!(sched.pending(), 0);

        run_for(&mut engine, &sched, 5000);
        assert_eq!(engine.phase(), DebatePhase::Drawing);
        assert!(engine.start().is_none());
        assert!(engine.ingest(event(json!({"debater": "Grace", "text": "x"}))).is_none());
        assert_eq!(engine.arguments().len(), 1);
        assert!(engine.is_shut_down());
    }

    #[test]
    fn test_scores_tally_revealed_votes() {
        let (mut engine, sched) = engine(EngineConfig::default());
        engine.ingest(event(json!({"debater": "Ada", "text": "Only"})));
        engine.ingest(event(json!({"judge": "A", "winner": "Ada"})));
        engine.ingest(event(json!({"judge": "B", "winner": "Grace"})));
        engine.ingest(event(json!({"judge": "C", "winner": "left"})));
        engine.sync_finished(true);

        run_for(&mut engine, &sched, 2000);
        engine.complete_argument();
        engine.conclude();
        assert_eq!(engine.phase(), DebatePhase::Judging);
        assert_eq!(engine.scores(), Scores::default());

        run_for(&mut engine, &sched, 1500);
        assert_eq!(engine.phase(), DebatePhase::WinnerAnnouncement);
        assert_eq!(engine.scores(), Scores { left: 1, right: 0 });

        run_for(&mut engine, &sched, 3000);
        assert_eq!(engine.revealed_judges(), 3);
        assert_eq!(engine.scores(), Scores { left: 2, right: 1 });
        assert_eq!(sched.pending(), 0);
    }
}
