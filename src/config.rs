// src/config.rs
//
// Engine configuration.
//
// Every field defaults to the engine's named constant, so an empty JSON
// object is a valid config. Values are sanitized, not rejected. Keys are
// camelCase, the same as practice settings.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::practice::FATIGUE_LIMIT;
use crate::scheduler::{LOOKAHEAD, TICK_INTERVAL};
use crate::tap::TAP_IDLE_RESET;
use crate::tempo::{DEFAULT_BPM, clamp_bpm, clamp_subdivision};

/// Period of the fatigue check (seconds).
pub const FATIGUE_POLL_INTERVAL: f64 = 1.0;

pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

/// Minimum number of ticks that must fit in one lookahead window.
const MIN_TICKS_PER_WINDOW: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub lookahead_secs: f64,
    pub tick_interval_secs: f64,
    pub fatigue_poll_secs: f64,
    pub fatigue_limit_secs: f64,
    pub tap_idle_reset_secs: f64,
    pub initial_bpm: f64,
    pub initial_subdivision: u32,
    pub sample_rate: f64,

    /// Queue visual cues for registered beat hooks
    pub visual_cues: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: LOOKAHEAD,
            tick_interval_secs: TICK_INTERVAL,
            fatigue_poll_secs: FATIGUE_POLL_INTERVAL,
            fatigue_limit_secs: FATIGUE_LIMIT,
            tap_idle_reset_secs: TAP_IDLE_RESET,
            initial_bpm: DEFAULT_BPM,
            initial_subdivision: 1,
            sample_rate: DEFAULT_SAMPLE_RATE,
            visual_cues: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Clamp every field into range.
    ///
    /// The tick interval is shrunk when needed so at least four ticks fit in
    /// one lookahead window.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();

        let lookahead_secs = positive_or(self.lookahead_secs, defaults.lookahead_secs, "lookaheadSecs");
        let mut tick_interval_secs =
            positive_or(self.tick_interval_secs, defaults.tick_interval_secs, "tickIntervalSecs");

        let max_tick = lookahead_secs / MIN_TICKS_PER_WINDOW;
        if tick_interval_secs > max_tick {
            warn!(
                "tickIntervalSecs {} too coarse for lookahead {}, using {}",
                tick_interval_secs, lookahead_secs, max_tick
            );
            tick_interval_secs = max_tick;
        }

        Self {
            lookahead_secs,
            tick_interval_secs,
            fatigue_poll_secs: positive_or(
                self.fatigue_poll_secs,
                defaults.fatigue_poll_secs,
                "fatiguePollSecs",
            ),
            fatigue_limit_secs: positive_or(
                self.fatigue_limit_secs,
                defaults.fatigue_limit_secs,
                "fatigueLimitSecs",
            ),
            tap_idle_reset_secs: positive_or(
                self.tap_idle_reset_secs,
                defaults.tap_idle_reset_secs,
                "tapIdleResetSecs",
            ),
            initial_bpm: clamp_bpm(self.initial_bpm),
            initial_subdivision: clamp_subdivision(self.initial_subdivision),
            sample_rate: positive_or(self.sample_rate, defaults.sample_rate, "sampleRate"),
            visual_cues: self.visual_cues,
        }
    }
}

fn positive_or(value: f64, fallback: f64, name: &str) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        warn!("{} {} invalid, using {}", name, value, fallback);
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.lookahead_secs, 0.1);
        assert_eq!(config.tick_interval_secs, 0.025);
    }

    #[test]
    fn test_tick_shrinks_to_fit_lookahead() {
        let config = EngineConfig::from_json(r#"{"lookaheadSecs": 0.2, "tickIntervalSecs": 0.1}"#)
            .unwrap();
        assert!(config.lookahead_secs >= 4.0 * config.tick_interval_secs);
        assert_eq!(config.tick_interval_secs, 0.05);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EngineConfig {
            lookahead_secs: -1.0,
            sample_rate: 0.0,
            initial_bpm: 1000.0,
            initial_subdivision: 0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.lookahead_secs, LOOKAHEAD);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.initial_bpm, 300.0);
        assert_eq!(config.initial_subdivision, 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"initialBpm": 90, "initialSubdivision": 3}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.initial_bpm, 90.0);
        assert_eq!(config.initial_subdivision, 3);
    }

    #[test]
    fn test_keys_match_practice_settings_convention() {
        let config = EngineConfig::from_json(
            r#"{"fatigueLimitSecs": 600, "tapIdleResetSecs": 3, "visualCues": false}"#,
        )
        .unwrap();
        assert_eq!(config.fatigue_limit_secs, 600.0);
        assert_eq!(config.tap_idle_reset_secs, 3.0);
        assert!(!config.visual_cues);

        let json = serde_json::to_string(&EngineConfig::default()).unwrap();
        assert!(json.contains("\"lookaheadSecs\""));
        assert!(!json.contains("lookahead_secs"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/tempokeeper.json").unwrap_err();
        assert!(matches!(err, EngineError::ConfigIo { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            EngineConfig::load(file.path()),
            Err(EngineError::ConfigParse { .. })
        ));
    }
}
