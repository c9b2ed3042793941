//! Replay loop: feeds a recording into the engine with real timers.
//!
//! Stands in for the presentation layer: it completes each argument after
//! a fixed speech time, concludes the waiting phases after a hold, starts
//! the debate if auto-start is off, and reports the producer finished once
//! the recording is exhausted.

use std::time::Duration;

use debate_engine::debate::PhaseTransition;
use debate_engine::{
    ConfidenceBySide, Debate, DebateEngine, DebatePhase, EngineConfig, Judge, PlayedCard, Scores,
    SessionContext, Side, StreamEvent, TokioScheduler,
};
use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

/// Pacing of the simulated presentation layer.
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Time each argument is "spoken" before it completes.
    pub speech: Duration,
    /// Spacing between recorded events.
    pub feed_interval: Duration,
    /// Hold on the presenter conclusion and the winner before concluding.
    pub hold: Duration,
    /// Give up after this long.
    pub max_duration: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            speech: Duration::from_millis(1500),
            feed_interval: Duration::from_millis(250),
            hold: Duration::from_millis(1000),
            max_duration: Duration::from_secs(600),
        }
    }
}

/// Final state of a replayed session.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub session_id: String,
    pub topic: String,
    pub final_phase: DebatePhase,
    pub completed: bool,
    pub round_index: i64,
    pub round: u32,
    pub arguments: usize,
    pub left_cards: Vec<PlayedCard>,
    pub right_cards: Vec<PlayedCard>,
    pub confidence: ConfidenceBySide,
    pub judges: Vec<Judge>,
    pub scores: Scores,
    pub winner: Option<Side>,
    pub presenter_intro: Option<String>,
    pub presenter_conclusion: Option<String>,
    pub transitions: Vec<PhaseTransition>,
}

impl ReplaySummary {
    fn capture(engine: &DebateEngine<TokioScheduler>) -> Self {
        let view = engine.view();
        Self {
            session_id: engine.session().session_id.clone(),
            topic: engine.debate().topic.clone(),
            final_phase: engine.phase(),
            completed: engine.phase().is_terminal(),
            round_index: engine.round_index(),
            round: view.round,
            arguments: engine.arguments().len(),
            left_cards: engine.left_cards().to_vec(),
            right_cards: engine.right_cards().to_vec(),
            confidence: engine.confidence(),
            judges: engine.judges().to_vec(),
            scores: engine.scores(),
            winner: view.winner,
            presenter_intro: engine.presenter_intro(),
            presenter_conclusion: engine.presenter_conclusion(),
            transitions: engine.transitions().to_vec(),
        }
    }
}

/// Delay before the presentation layer acts in `phase`, if it acts at all.
fn action_delay(
    engine: &DebateEngine<TokioScheduler>,
    phase: DebatePhase,
    opts: &ReplayOptions,
) -> Option<Duration> {
    match phase {
        DebatePhase::Intro if !engine.arguments().is_empty() => Some(Duration::ZERO),
        DebatePhase::Speaking => Some(opts.speech),
        DebatePhase::ModeratorConclusion | DebatePhase::WinnerAnnouncement => Some(opts.hold),
        _ => None,
    }
}

fn act(engine: &mut DebateEngine<TokioScheduler>, phase: DebatePhase) {
    match phase {
        DebatePhase::Intro => engine.start(),
        DebatePhase::Speaking => engine.complete_argument(),
        DebatePhase::ModeratorConclusion | DebatePhase::WinnerAnnouncement => engine.conclude(),
        _ => None,
    };
}

/// Run `events` through a fresh engine until the debate completes, stalls
/// for good, or `max_duration` passes.
pub async fn replay(
    debate: Debate,
    config: EngineConfig,
    session: SessionContext,
    events: Vec<StreamEvent>,
    opts: ReplayOptions,
) -> ReplaySummary {
    let (scheduler, mut ticks) = TokioScheduler::channel();
    let mut engine = DebateEngine::new(debate, config, session, scheduler);

    let total = events.len();
    let mut feed = events.into_iter();
    let mut feed_done = false;
    let mut feed_timer = tokio::time::interval(opts.feed_interval.max(Duration::from_millis(1)));
    let give_up = sleep_until(Instant::now() + opts.max_duration);
    tokio::pin!(give_up);

    // (due, state it was scheduled for); `None` due once fired
    let mut pending: Option<(Option<Instant>, (usize, bool))> = None;

    info!(
        session_id = %engine.session().session_id,
        events = total,
        "replay starting"
    );

    loop {
        let phase = engine.phase();
        if phase.is_terminal() {
            break;
        }
        if feed_done && phase == DebatePhase::Intro && engine.arguments().is_empty() {
            warn!("recording ended without a single argument");
            break;
        }

        let step = (engine.transitions().len(), engine.arguments().is_empty());
        if pending.map(|(_, at_step)| at_step) != Some(step) {
            let due = action_delay(&engine, phase, &opts).map(|d| Instant::now() + d);
            pending = Some((due, step));
        }
        let due = pending.and_then(|(at, _)| at);

        tokio::select! {
            Some(tick) = ticks.recv() => {
                engine.handle_tick(tick);
            }
            _ = feed_timer.tick(), if !feed_done => {
                match feed.next() {
                    Some(event) => {
                        engine.ingest(event);
                    }
                    None => {
                        feed_done = true;
                        engine.sync_finished(true);
                        info!(events = total, "recording drained");
                    }
                }
            }
            _ = sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                pending = Some((None, step));
                act(&mut engine, phase);
            }
            _ = &mut give_up => {
                warn!(phase = %engine.phase(), "replay timed out");
                break;
            }
        }
    }

    engine.shutdown();
    let summary = ReplaySummary::capture(&engine);
    info!(
        session_id = %summary.session_id,
        phase = %summary.final_phase,
        judges = summary.judges.len(),
        "replay finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use debate_engine::debate::{Debater, Debaters};
    use serde_json::json;

    fn debate() -> Debate {
        let debater = |id: Side, name: &str| Debater {
            id,
            name: name.to_string(),
            title: String::new(),
            avatar: String::new(),
            ideology: None,
        };
        Debate {
            topic: "Replay".to_string(),
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

    fn events() -> Vec<StreamEvent> {
        [
            json!({"event": "moderator_intro_done", "data": {"output": "Welcome"}}),
            json!({"debater": "Ada", "text": "One", "confidence": 81}),
            json!({"event": "ping"}),
            json!({"debater": "Grace", "text": "Two", "confidence": 64}),
            json!({"agent": "Logic Judge", "output": "{\"judge\": \"Logic\", \"winner\": \"Grace\"}"}),
            json!({"agent": "Style Judge", "output": "Winner: Grace\nReasoning: calm"}),
            json!({"event": "moderator_conclusion_done", "data": {"output": "Goodnight"}}),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_runs_to_completion() {
        let summary = replay(
            debate(),
            EngineConfig::default(),
            SessionContext::with_id("replay-test", None),
            events(),
            ReplayOptions::default(),
        )
        .await;

        assert!(summary.completed);
        assert_eq!(summary.final_phase, DebatePhase::Complete);
        assert_eq!(summary.arguments, 2);
        assert_eq!(summary.left_cards.len(), 1);
        assert_eq!(summary.right_cards.len(), 1);
        assert_eq!(summary.confidence.left, 81);
        assert_eq!(summary.confidence.right, 64);
        assert_eq!(summary.judges.len(), 2);
        assert_eq!(summary.winner, Some(Side::Right));
        assert_eq!(summary.presenter_intro.as_deref(), Some("Welcome"));
        assert_eq!(summary.presenter_conclusion.as_deref(), Some("Goodnight"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_starts_manually_without_auto_start() {
        let config = EngineConfig {
            auto_start: false,
            ..EngineConfig::default()
        };
        let summary = replay(
            debate(),
            config,
            SessionContext::anonymous(),
            events(),
            ReplayOptions::default(),
        )
        .await;

        assert!(summary.completed);
        assert_eq!(summary.transitions[0].from, DebatePhase::Intro);
        assert_eq!(summary.transitions[0].to, DebatePhase::Drawing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_without_arguments_stops() {
        let events = vec![serde_json::from_value(json!({"event": "ping"})).unwrap()];
        let summary = replay(
            debate(),
            EngineConfig::default(),
            SessionContext::anonymous(),
            events,
            ReplayOptions::default(),
        )
        .await;
        assert!(!summary.completed);
        assert_eq!(summary.final_phase, DebatePhase::Intro);
    }
}
