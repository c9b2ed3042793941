//! Debate Orchestration: staged two-party debate driven by a live stream
//!
//! Raw producer events are reconciled into canonical arguments and judge
//! verdicts, then fed to a deterministic phase machine that paces the debate
//! with cancellable timers.
//!
//! # Data Flow
//!
//! ```text
//! StreamEvent ──decode──▶ mapper ──Vec<Argument>──┐
//!      │                                          ├─▶ DebateEngine ──▶ DebateMachine
//!      └──────────────▶ verdict ──Vec<Judge>──────┘        │                │
//!                                                     Scheduler         cards ledger
//!                                                   (ticks + epoch)          │
//!                                                                            ▼
//!                                                                       DebateView
//! ```

pub mod cards;
pub mod engine;
pub mod machine;
pub mod mapper;
pub mod model;
pub mod scheduler;
pub mod stream;
pub mod verdict;
pub mod view;

pub use cards::{add_card_if_missing, create_played_card, PlayedCard};
pub use engine::{DebateEngine, Scores};
pub use machine::{
    is_last_round_and_finished, DebateMachine, DebatePhase, DebateSignal, MachineContext,
    PhaseTransition, SyncOutcome,
};
pub use mapper::{build_arguments, map_event_to_argument, presenter_conclusion, presenter_intro};
pub use model::{
    Argument, CardType, ConfidenceBySide, Debate, Debater, DebaterProfile, DebateSetup, Debaters,
    Judge, Presenter, RubricScore, Side, DEFAULT_CONFIDENCE,
};
pub use scheduler::{CancelHandle, ManualScheduler, Scheduler, Tick, TimerKind, TokioScheduler};
pub use stream::{parse_sse_message, DecodedEvent, PresenterCue, StreamEvent};
pub use verdict::{build_judges, extract_candidate, resolve_winner, VerdictCandidate};
pub use view::DebateView;
