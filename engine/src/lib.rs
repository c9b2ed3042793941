//! Debate Engine Library
//!
//! This library provides:
//! - A phase state machine that stages a turn-based, two-party debate
//! - Reconciliation of a live, loosely-shaped event stream into arguments
//!   and judge verdicts
//! - Cancellable, epoch-stamped phase timers with a deterministic test clock
//!
//! # Usage
//!
//! ```no_run
//! use debate_engine::{DebateEngine, DebateSetup, EngineConfig, SessionContext, TokioScheduler};
//!
//! # async fn run(setup: DebateSetup) -> Result<(), Box<dyn std::error::Error>> {
//! let (scheduler, mut ticks) = TokioScheduler::channel();
//! let mut engine = DebateEngine::new(
//!     setup.into_debate()?,
//!     EngineConfig::from_env(),
//!     SessionContext::anonymous(),
//!     scheduler,
//! );
//! while let Some(tick) = ticks.recv().await {
//!     engine.handle_tick(tick);
//! }
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod debate;
pub mod error;
pub mod session;

pub use config::{EngineConfig, PhaseDelays};
pub use error::{ArenaError, ArenaResult};
pub use session::SessionContext;

// Re-export key debate types
pub use debate::{
    build_arguments, build_judges, resolve_winner, Argument, CardType, ConfidenceBySide, Debate,
    DebateEngine, DebateMachine, DebatePhase, DebateSetup, DebateSignal, DebateView, Judge,
    ManualScheduler, PlayedCard, Scheduler, Scores, Side, StreamEvent, Tick, TimerKind,
    TokioScheduler,
};
