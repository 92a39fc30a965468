// src/practice/settings.rs
//
// User-configured practice parameters.
//
// Settings arrive as a persisted JSON blob and are sanitized once when a
// session starts. A session never sees out-of-range values.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::tempo::clamp_bpm;

/// Note value a practice tempo is counted in.
///
/// The numeric value is the note-value denominator: a quarter-note pulse
/// is 4, a sixteenth-note pulse is 16.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseUnit {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
}

impl PulseUnit {
    pub const ALL: [PulseUnit; 5] = [
        PulseUnit::Whole,
        PulseUnit::Half,
        PulseUnit::Quarter,
        PulseUnit::Eighth,
        PulseUnit::Sixteenth,
    ];

    #[inline]
    pub fn denominator(self) -> u32 {
        match self {
            PulseUnit::Whole => 1,
            PulseUnit::Half => 2,
            PulseUnit::Quarter => 4,
            PulseUnit::Eighth => 8,
            PulseUnit::Sixteenth => 16,
        }
    }

    pub fn from_denominator(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.denominator() == value)
    }

    /// Next finer note value, or None at sixteenths.
    pub fn doubled(self) -> Option<Self> {
        Self::from_denominator(self.denominator() * 2)
    }

    /// Next coarser note value, or None at whole notes.
    pub fn halved(self) -> Option<Self> {
        if self == PulseUnit::Whole {
            return None;
        }
        Self::from_denominator(self.denominator() / 2)
    }

    pub fn name(self) -> &'static str {
        match self {
            PulseUnit::Whole => "whole",
            PulseUnit::Half => "half",
            PulseUnit::Quarter => "quarter",
            PulseUnit::Eighth => "eighth",
            PulseUnit::Sixteenth => "sixteenth",
        }
    }
}

/// Tempo normalized to whole-note pulses per minute.
///
/// Lets tempos counted in different note values be compared.
#[inline]
pub fn pulse_rate(bpm: f64, unit: PulseUnit) -> f64 {
    bpm / f64::from(unit.denominator())
}

/// Practice configuration, immutable for the length of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PracticeSettings {
    pub starting_bpm: f64,
    pub starting_pulse_unit: PulseUnit,
    pub target_bpm: f64,
    pub target_pulse_unit: PulseUnit,

    /// Passes needed at one tempo before it advances
    pub required_correct: i64,

    /// BPM added per level
    pub increment: f64,

    /// BPM removed per failure
    pub penalty: f64,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            starting_bpm: 60.0,
            starting_pulse_unit: PulseUnit::Quarter,
            target_bpm: 120.0,
            target_pulse_unit: PulseUnit::Quarter,
            required_correct: 3,
            increment: 5.0,
            penalty: 5.0,
        }
    }
}

impl PracticeSettings {
    /// Parse a persisted settings blob. Missing fields take defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Clamp every field to its valid range.
    pub fn sanitized(&self) -> Self {
        let required_correct = if self.required_correct < 1 {
            warn!("requiredCorrect {} clamped to 1", self.required_correct);
            1
        } else {
            self.required_correct
        };

        let increment = if self.increment >= 1.0 {
            self.increment
        } else {
            warn!("increment {} clamped to 1", self.increment);
            1.0
        };

        let penalty = if self.penalty >= 0.0 {
            self.penalty
        } else {
            warn!("penalty {} clamped to 0", self.penalty);
            0.0
        };

        Self {
            starting_bpm: clamp_bpm(self.starting_bpm),
            starting_pulse_unit: self.starting_pulse_unit,
            target_bpm: clamp_bpm(self.target_bpm),
            target_pulse_unit: self.target_pulse_unit,
            required_correct,
            increment,
            penalty,
        }
    }

    /// Normalized rate a session must reach to complete.
    #[inline]
    pub fn target_rate(&self) -> f64 {
        pulse_rate(self.target_bpm, self.target_pulse_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_unit_steps() {
        assert_eq!(PulseUnit::Quarter.doubled(), Some(PulseUnit::Eighth));
        assert_eq!(PulseUnit::Sixteenth.doubled(), None);
        assert_eq!(PulseUnit::Half.halved(), Some(PulseUnit::Whole));
        assert_eq!(PulseUnit::Whole.halved(), None);
    }

    #[test]
    fn test_pulse_rate() {
        assert_eq!(pulse_rate(120.0, PulseUnit::Quarter), 30.0);
        assert_eq!(pulse_rate(120.0, PulseUnit::Eighth), 15.0);
    }

    #[test]
    fn test_sanitize_clamps_malformed_values() {
        let settings = PracticeSettings {
            starting_bpm: 5.0,
            target_bpm: 900.0,
            required_correct: 0,
            increment: -3.0,
            penalty: -1.0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(settings.starting_bpm, 20.0);
        assert_eq!(settings.target_bpm, 300.0);
        assert_eq!(settings.required_correct, 1);
        assert_eq!(settings.increment, 1.0);
        assert_eq!(settings.penalty, 0.0);
    }

    #[test]
    fn test_nan_increment_is_clamped() {
        let settings = PracticeSettings {
            increment: f64::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.increment, 1.0);
    }

    #[test]
    fn test_parse_partial_blob() {
        let settings = PracticeSettings::from_json(
            r#"{"startingBpm": 72, "targetPulseUnit": "eighth", "requiredCorrect": 2}"#,
        )
        .unwrap();

        assert_eq!(settings.starting_bpm, 72.0);
        assert_eq!(settings.target_pulse_unit, PulseUnit::Eighth);
        assert_eq!(settings.required_correct, 2);
        assert_eq!(settings.target_bpm, 120.0);
    }

    #[test]
    fn test_json_roundtrip_keeps_names() {
        let json = PracticeSettings::default().to_json().unwrap();
        assert!(json.contains("\"startingPulseUnit\":\"quarter\""));
    }

    #[test]
    fn test_rejects_unknown_pulse_unit() {
        assert!(PracticeSettings::from_json(r#"{"startingPulseUnit": "triplet"}"#).is_err());
    }
}
