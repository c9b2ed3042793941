//! Engine configuration: phase delays, default confidence, auto-start.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::debate::model::{DEFAULT_CONFIDENCE, MAX_CONFIDENCE};

/// Fixed per-phase delays, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDelays {
    /// drawing → playing
    pub draw_to_play_ms: u64,
    /// playing → speaking
    pub play_to_speak_ms: u64,
    /// judging → winnerAnnouncement
    pub verdict_delay_ms: u64,
    /// Interval between judge reveals.
    pub judge_reveal_ms: u64,
}

impl Default for PhaseDelays {
    fn default() -> Self {
        Self {
            draw_to_play_ms: 1000,
            play_to_speak_ms: 1000,
            verdict_delay_ms: 1000,
            judge_reveal_ms: 1500,
        }
    }
}

impl PhaseDelays {
    pub fn draw_to_play(&self) -> Duration {
        Duration::from_millis(self.draw_to_play_ms)
    }

    pub fn play_to_speak(&self) -> Duration {
        Duration::from_millis(self.play_to_speak_ms)
    }

    pub fn verdict_delay(&self) -> Duration {
        Duration::from_millis(self.verdict_delay_ms)
    }

    pub fn judge_reveal(&self) -> Duration {
        Duration::from_millis(self.judge_reveal_ms)
    }
}

/// Configuration for a [`DebateEngine`](crate::debate::engine::DebateEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub delays: PhaseDelays,
    /// Starting confidence for both sides, restored on reset.
    pub default_confidence: u8,
    /// Dispatch `START` on the first sync that delivers an argument.
    pub auto_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delays: PhaseDelays::default(),
            default_confidence: DEFAULT_CONFIDENCE,
            auto_start: true,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let millis = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(ms) = millis("ARENA_DRAW_TO_PLAY_MS") {
            config.delays.draw_to_play_ms = ms;
        }
        if let Some(ms) = millis("ARENA_PLAY_TO_SPEAK_MS") {
            config.delays.play_to_speak_ms = ms;
        }
        if let Some(ms) = millis("ARENA_VERDICT_DELAY_MS") {
            config.delays.verdict_delay_ms = ms;
        }
        if let Some(ms) = millis("ARENA_JUDGE_REVEAL_MS") {
            config.delays.judge_reveal_ms = ms;
        }
        if let Some(val) = lookup("ARENA_DEFAULT_CONFIDENCE") {
            if let Ok(n) = val.trim().parse::<u8>() {
                config.default_confidence = n.min(MAX_CONFIDENCE);
            }
        }
        if let Some(val) = lookup("ARENA_AUTO_START") {
            config.auto_start = parse_flag(val.trim());
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.delays.draw_to_play(), Duration::from_millis(1000));
        assert_eq!(config.delays.judge_reveal(), Duration::from_millis(1500));
        assert_eq!(config.default_confidence, 75);
        assert!(config.auto_start);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ARENA_DRAW_TO_PLAY_MS", "250"),
            ("ARENA_JUDGE_REVEAL_MS", " 10 "),
            ("ARENA_DEFAULT_CONFIDENCE", "140"),
            ("ARENA_AUTO_START", "false"),
        ]));
        assert_eq!(config.delays.draw_to_play_ms, 250);
        assert_eq!(config.delays.play_to_speak_ms, 1000);
        assert_eq!(config.delays.judge_reveal_ms, 10);
        assert_eq!(config.default_confidence, 100);
        assert!(!config.auto_start);
    }

    #[test]
    fn test_env_ignores_garbage() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("ARENA_VERDICT_DELAY_MS", "soon"),
            ("ARENA_DEFAULT_CONFIDENCE", "-5"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"delays": {"draw_to_play_ms": 5}, "auto_start": false}"#).unwrap();
        assert_eq!(config.delays.draw_to_play_ms, 5);
        assert_eq!(config.delays.verdict_delay_ms, 1000);
        assert!(!config.auto_start);
    }
}
