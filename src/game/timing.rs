use log::info;
use std::cmp::Ordering;

use crate::game::chart::Pattern;

/// Floor division rounding toward negative infinity, so pre-roll pulses
/// (which are negative) land in the correct scan: `floor_div(-3, 2) == -2`.
#[inline(always)]
pub const fn floor_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

/// Bidirectional pulse <-> audio-time conversion over the tempo timeline.
///
/// Built once per session from validated pattern data; a pure function of it
/// afterwards. Each tempo segment is an affine function of pulse, so both
/// directions are a binary search plus one interpolation, total over all
/// inputs: pulses before 0 extrapolate backward on the first tempo, pulses
/// past the last event extrapolate forward on the last.
#[derive(Debug, Clone, Default)]
pub struct TempoMap {
    points: Vec<PulseTimePoint>,
}

#[derive(Debug, Clone, Copy)]
struct PulseTimePoint {
    pulse: i64,
    time_sec: f32,
    seconds_per_pulse: f32,
}

impl TempoMap {
    /// Validates the pattern's timeline and precomputes the per-segment
    /// prefix times. This is the load boundary of §7-style errors; nothing
    /// downstream checks the timeline again.
    pub fn from_pattern(pattern: &Pattern) -> Result<Self, &'static str> {
        pattern.validate()?;

        let pulses_per_beat = pattern.pulses_per_beat as f32;
        let mut points = Vec::with_capacity(pattern.tempo_events.len());
        let mut current_time = pattern.first_beat_offset_seconds;
        let mut last_pulse = 0_i64;
        let mut last_spp = 0.0_f32;

        for event in &pattern.tempo_events {
            let seconds_per_pulse = 60.0 / (event.beats_per_minute * pulses_per_beat);
            if event.pulse > last_pulse {
                current_time += (event.pulse - last_pulse) as f32 * last_spp;
            }
            points.push(PulseTimePoint {
                pulse: event.pulse,
                time_sec: current_time,
                seconds_per_pulse,
            });
            last_pulse = event.pulse;
            last_spp = seconds_per_pulse;
        }

        info!(
            "TempoMap built: {} tempo segments, first beat offset {:.3}s",
            points.len(),
            pattern.first_beat_offset_seconds
        );
        Ok(Self { points })
    }

    pub fn pulse_to_time(&self, pulse: f32) -> f32 {
        let point = self.point_for_pulse(pulse);
        (pulse - point.pulse as f32).mul_add(point.seconds_per_pulse, point.time_sec)
    }

    pub fn time_to_pulse(&self, time_sec: f32) -> f32 {
        let point = self.point_for_time(time_sec);
        point.pulse as f32 + (time_sec - point.time_sec) / point.seconds_per_pulse
    }

    fn point_for_pulse(&self, pulse: f32) -> &PulseTimePoint {
        let idx = match self.points.binary_search_by(|p| {
            (p.pulse as f32)
                .partial_cmp(&pulse)
                .unwrap_or(Ordering::Less)
        }) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        &self.points[idx]
    }

    fn point_for_time(&self, time_sec: f32) -> &PulseTimePoint {
        let idx = match self.points.binary_search_by(|p| {
            p.time_sec
                .partial_cmp(&time_sec)
                .unwrap_or(Ordering::Less)
        }) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        &self.points[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::{TempoMap, floor_div};
    use crate::game::chart::{Pattern, TempoEvent};

    fn pattern_with_tempi(events: &[(i64, f32)], first_beat_offset: f32) -> Pattern {
        Pattern {
            tempo_events: events
                .iter()
                .map(|&(pulse, bpm)| TempoEvent {
                    pulse,
                    beats_per_minute: bpm,
                })
                .collect(),
            pulses_per_beat: 240,
            beats_per_scan: 4,
            first_beat_offset_seconds: first_beat_offset,
            notes: Vec::new(),
        }
    }

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(-3, 2), -2);
        assert_eq!(floor_div(-1, 960), -1);
        assert_eq!(floor_div(-960, 960), -1);
        assert_eq!(floor_div(0, 960), 0);
        assert_eq!(floor_div(959, 960), 0);
        assert_eq!(floor_div(960, 960), 1);
    }

    #[test]
    fn one_beat_at_120_bpm_is_half_a_second() {
        let map = TempoMap::from_pattern(&pattern_with_tempi(&[(0, 120.0)], 0.0)).unwrap();
        let t = map.pulse_to_time(240.0);
        assert!((t - 0.5).abs() < 1e-5, "expected 0.5s, got {t}");
    }

    #[test]
    fn first_beat_offset_shifts_the_whole_timeline() {
        let map = TempoMap::from_pattern(&pattern_with_tempi(&[(0, 120.0)], 1.5)).unwrap();
        assert!((map.pulse_to_time(0.0) - 1.5).abs() < 1e-5);
        assert!((map.pulse_to_time(240.0) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn tempo_changes_compound_across_segments() {
        // 120 BPM for 2 beats (1.0s), then 240 BPM: each following beat is 0.25s.
        let map =
            TempoMap::from_pattern(&pattern_with_tempi(&[(0, 120.0), (480, 240.0)], 0.0)).unwrap();
        assert!((map.pulse_to_time(480.0) - 1.0).abs() < 1e-5);
        assert!((map.pulse_to_time(720.0) - 1.25).abs() < 1e-5);
        assert!((map.time_to_pulse(1.25) - 720.0).abs() < 1e-2);
    }

    #[test]
    fn round_trip_is_stable_across_the_time_domain() {
        let map = TempoMap::from_pattern(&pattern_with_tempi(
            &[(0, 96.0), (960, 192.0), (1440, 60.0), (4800, 150.0)],
            -0.35,
        ))
        .unwrap();
        let mut t = -2.0_f32;
        while t < 40.0 {
            let back = map.pulse_to_time(map.time_to_pulse(t));
            assert!(
                (back - t).abs() < 1e-3,
                "round trip drifted at t={t}: got {back}"
            );
            t += 0.173;
        }
    }

    #[test]
    fn time_to_pulse_is_strictly_monotonic() {
        let map = TempoMap::from_pattern(&pattern_with_tempi(
            &[(0, 120.0), (480, 300.0), (960, 72.5)],
            0.0,
        ))
        .unwrap();
        let mut prev = map.time_to_pulse(-5.0);
        let mut t = -5.0_f32 + 0.05;
        while t < 30.0 {
            let p = map.time_to_pulse(t);
            assert!(p > prev, "pulse must strictly increase, stalled at t={t}");
            prev = p;
            t += 0.05;
        }
    }

    #[test]
    fn negative_pulses_extrapolate_on_the_first_tempo() {
        let map = TempoMap::from_pattern(&pattern_with_tempi(&[(0, 120.0)], 0.0)).unwrap();
        // One beat before pulse 0 at 120 BPM.
        assert!((map.pulse_to_time(-240.0) + 0.5).abs() < 1e-5);
        assert!((map.time_to_pulse(-0.5) + 240.0).abs() < 1e-2);
    }

    #[test]
    fn pulses_past_the_last_event_extrapolate_on_its_tempo() {
        let map =
            TempoMap::from_pattern(&pattern_with_tempi(&[(0, 120.0), (240, 60.0)], 0.0)).unwrap();
        // After pulse 240 each beat lasts a full second.
        assert!((map.pulse_to_time(480.0) - 1.5).abs() < 1e-5);
        assert!((map.pulse_to_time(960.0) - 3.5).abs() < 1e-5);
    }
}
