use rodio::Source;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
/// Attack/release ramp so cues start and stop without clicks.
const RAMP_SECS: f32 = 0.01;

/// User-selectable cue sound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToneKind {
    Silent,
    #[default]
    Beep,
    Chime,
    Whistle,
}

impl ToneKind {
    pub fn id(self) -> &'static str {
        match self {
            ToneKind::Silent => "silent",
            ToneKind::Beep => "beep",
            ToneKind::Chime => "chime",
            ToneKind::Whistle => "whistle",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "silent" => Some(ToneKind::Silent),
            "beep" => Some(ToneKind::Beep),
            "chime" => Some(ToneKind::Chime),
            "whistle" => Some(ToneKind::Whistle),
            _ => None,
        }
    }

    pub fn is_silent(self) -> bool {
        self == ToneKind::Silent
    }

    /// One repetition of this cue plus the gap before the next one.
    pub fn source(self) -> CueTone {
        match self {
            ToneKind::Silent => CueTone::new(0.0, 0.0, 0.0, 0.0),
            ToneKind::Beep => CueTone::new(880.0, 880.0, 0.25, 0.15),
            ToneKind::Chime => CueTone::new(1046.5, 659.25, 0.6, 0.1),
            ToneKind::Whistle => CueTone::new(1800.0, 2600.0, 0.35, 0.1),
        }
    }
}

/// A single sine sweep from `start_freq` to `end_freq`, followed by silence.
pub struct CueTone {
    start_freq: f32,
    end_freq: f32,
    tone_samples: usize,
    total_samples: usize,
    num_sample: usize,
    phase: f32,
}

impl CueTone {
    fn new(start_freq: f32, end_freq: f32, tone_secs: f32, gap_secs: f32) -> Self {
        let tone_samples = (tone_secs * SAMPLE_RATE as f32) as usize;
        let gap_samples = (gap_secs * SAMPLE_RATE as f32) as usize;
        Self {
            start_freq,
            end_freq,
            tone_samples,
            total_samples: tone_samples + gap_samples,
            num_sample: 0,
            phase: 0.0,
        }
    }

    fn envelope(&self) -> f32 {
        let ramp = RAMP_SECS * SAMPLE_RATE as f32;
        let from_start = self.num_sample as f32;
        let to_end = (self.tone_samples - self.num_sample) as f32;
        (from_start / ramp).min(to_end / ramp).min(1.0)
    }
}

impl Iterator for CueTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let sample = if self.num_sample < self.tone_samples {
            let progress = self.num_sample as f32 / self.tone_samples as f32;
            let freq = self.start_freq + (self.end_freq - self.start_freq) * progress;
            self.phase = (self.phase + 2.0 * PI * freq / SAMPLE_RATE as f32) % (2.0 * PI);
            self.phase.sin() * self.envelope() * 0.5
        } else {
            0.0
        };

        self.num_sample += 1;
        Some(sample)
    }
}

impl Source for CueTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for kind in [ToneKind::Silent, ToneKind::Beep, ToneKind::Chime, ToneKind::Whistle] {
            assert_eq!(ToneKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(ToneKind::from_id("klaxon"), None);
    }

    #[test]
    fn beep_is_finite_and_bounded() {
        let tone = ToneKind::Beep.source();
        let expected = tone.total_samples;
        let samples: Vec<f32> = tone.collect();
        assert_eq!(samples.len(), expected);
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
        assert_eq!(*samples.last().unwrap(), 0.0);
    }

    #[test]
    fn silent_tone_has_no_samples() {
        assert_eq!(ToneKind::Silent.source().count(), 0);
    }
}
