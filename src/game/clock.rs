use log::{debug, info};
use smallvec::SmallVec;

use crate::game::timing::{TempoMap, floor_div};

/// Fraction of a scan by which the look-ahead boundary leads the exact one:
/// `ScanAboutToChange(s)` fires one eighth of a scan before `ScanChanged(s)`.
pub const LOOKAHEAD_DENOMINATOR: i64 = 8;

/// Current musical position, derived once per frame from the tempo map and
/// the sampled elapsed audio time. Never written by anything but the
/// [`ScanClock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GameClock {
    pub elapsed_audio_time: f32,
    pub float_pulse: f32,
    pub pulse: i64,
    pub scan: i64,
}

/// Boundary crossings for one frame, in pulse order. The look-ahead event
/// for a scan strictly precedes the exact event for that same scan, and each
/// fires at most once per crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanEvent {
    AboutToChange { scan: i64 },
    Changed { scan: i64 },
}

/// Everything one `advance` call produced.
#[derive(Debug, Default)]
pub struct ClockFrame {
    pub events: SmallVec<[ScanEvent; 4]>,
    /// Set on the single frame where logical time crosses zero: start the
    /// backing track, seeking to this many seconds so audio and logical
    /// clock stay phase-locked even when the frame is delivered late.
    pub playback_seek: Option<f32>,
}

/// Per-frame driver of the session clock.
///
/// Construction rolls the clock back whole scans until logical time goes
/// negative, then one scan further, so the session opens with pre-roll and
/// backing-track playback begins exactly one scan before the first notes can
/// appear.
#[derive(Clone, Debug)]
pub struct ScanClock {
    pulses_per_scan: i64,
    pub clock: GameClock,
    lookahead_scan: i64,
}

impl ScanClock {
    pub fn new(tempo_map: &TempoMap, pulses_per_scan: i64) -> Self {
        let mut scan = 0_i64;
        while tempo_map.pulse_to_time((scan * pulses_per_scan) as f32) >= 0.0 {
            scan -= 1;
        }
        scan -= 1;

        let pulse = scan * pulses_per_scan;
        let clock = GameClock {
            elapsed_audio_time: tempo_map.pulse_to_time(pulse as f32),
            float_pulse: pulse as f32,
            pulse,
            scan,
        };
        let lookahead_scan = floor_div(
            pulse + pulses_per_scan / LOOKAHEAD_DENOMINATOR,
            pulses_per_scan,
        );
        info!(
            "ScanClock starts at scan {scan} (pulse {pulse}, {:.3}s of pre-roll)",
            -clock.elapsed_audio_time
        );
        Self {
            pulses_per_scan,
            clock,
            lookahead_scan,
        }
    }

    /// The clock's initial position; `advance` fires nothing retroactive to
    /// this.
    #[inline(always)]
    pub const fn initial_scan(&self) -> i64 {
        self.clock.scan
    }

    /// One frame: sample the new elapsed audio time, derive the position and
    /// emit every boundary crossed since the previous frame, in pulse order.
    /// Time moving backward emits nothing; events are never retracted.
    pub fn advance(&mut self, tempo_map: &TempoMap, elapsed_audio_time: f32) -> ClockFrame {
        let prev = self.clock;
        let float_pulse = tempo_map.time_to_pulse(elapsed_audio_time);
        let pulse = float_pulse.floor() as i64;
        let scan = floor_div(pulse, self.pulses_per_scan);
        self.clock = GameClock {
            elapsed_audio_time,
            float_pulse,
            pulse,
            scan,
        };

        let mut frame = ClockFrame::default();
        if prev.elapsed_audio_time < 0.0 && elapsed_audio_time >= 0.0 {
            frame.playback_seek = Some(elapsed_audio_time);
            debug!("logical time crossed zero, starting playback at {elapsed_audio_time:.4}s");
        }

        let pps = self.pulses_per_scan;
        let lookahead_target = floor_div(pulse + pps / LOOKAHEAD_DENOMINATOR, pps);
        let scan_target = scan.max(prev.scan);

        // Interleave the two boundary kinds by the pulse each fired at:
        // AboutToChange(s) sits one eighth of a scan before Changed(s).
        let mut about = self.lookahead_scan;
        let mut exact = prev.scan;
        while about < lookahead_target || exact < scan_target {
            let about_pulse = (about + 1) * pps - pps / LOOKAHEAD_DENOMINATOR;
            let exact_pulse = (exact + 1) * pps;
            if about < lookahead_target && (exact >= scan_target || about_pulse <= exact_pulse) {
                about += 1;
                frame.events.push(ScanEvent::AboutToChange { scan: about });
            } else {
                exact += 1;
                frame.events.push(ScanEvent::Changed { scan: exact });
            }
        }
        self.lookahead_scan = self.lookahead_scan.max(lookahead_target);

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::{ScanClock, ScanEvent};
    use crate::game::chart::{Pattern, TempoEvent};
    use crate::game::timing::TempoMap;

    // 120 BPM, 240 pulses per beat, 4 beats per scan: one scan lasts 2s and
    // spans 960 pulses.
    fn fixture() -> (TempoMap, i64) {
        let pattern = Pattern {
            tempo_events: vec![TempoEvent {
                pulse: 0,
                beats_per_minute: 120.0,
            }],
            pulses_per_beat: 240,
            beats_per_scan: 4,
            first_beat_offset_seconds: 0.0,
            notes: Vec::new(),
        };
        let pps = pattern.pulses_per_scan();
        (TempoMap::from_pattern(&pattern).unwrap(), pps)
    }

    #[test]
    fn pre_roll_backs_up_one_extra_scan() {
        let (map, pps) = fixture();
        let clock = ScanClock::new(&map, pps);
        // Pulse 0 is at time 0, so one scan back reaches negative time and
        // the extra scan lands us at -2.
        assert_eq!(clock.initial_scan(), -2);
        assert!(clock.clock.elapsed_audio_time < 0.0);
    }

    #[test]
    fn playback_starts_once_when_time_crosses_zero() {
        let (map, pps) = fixture();
        let mut clock = ScanClock::new(&map, pps);
        let frame = clock.advance(&map, -0.5);
        assert!(frame.playback_seek.is_none());
        let frame = clock.advance(&map, 0.013);
        assert_eq!(frame.playback_seek, Some(0.013));
        let frame = clock.advance(&map, 0.03);
        assert!(frame.playback_seek.is_none(), "playback starts exactly once");
    }

    #[test]
    fn lookahead_precedes_the_exact_boundary() {
        let (map, pps) = fixture();
        let mut clock = ScanClock::new(&map, pps);
        // Jump from pre-roll straight past the start of scan 0. Every crossed
        // boundary fires, look-ahead first for each scan index.
        let frame = clock.advance(&map, 0.1);
        let expected = [
            ScanEvent::AboutToChange { scan: -1 },
            ScanEvent::Changed { scan: -1 },
            ScanEvent::AboutToChange { scan: 0 },
            ScanEvent::Changed { scan: 0 },
        ];
        assert_eq!(frame.events.as_slice(), &expected);
    }

    #[test]
    fn boundaries_fire_at_most_once_over_small_steps() {
        let (map, pps) = fixture();
        let mut clock = ScanClock::new(&map, pps);
        let mut about = Vec::new();
        let mut changed = Vec::new();
        let mut t = clock.clock.elapsed_audio_time;
        while t < 5.5 {
            for ev in clock.advance(&map, t).events {
                match ev {
                    ScanEvent::AboutToChange { scan } => about.push(scan),
                    ScanEvent::Changed { scan } => changed.push(scan),
                }
            }
            t += 0.016;
        }
        // Scans -1, 0, 1, 2 all crossed exactly once, in order.
        assert_eq!(about, vec![-1, 0, 1, 2]);
        assert_eq!(changed, vec![-1, 0, 1, 2]);
    }

    #[test]
    fn lookahead_fires_an_eighth_of_a_scan_early() {
        let (map, pps) = fixture();
        let mut clock = ScanClock::new(&map, pps);
        // Scan 0 starts at t=0; its look-ahead boundary is 1/8 scan (0.25s)
        // earlier. Stop just short of it first.
        clock.advance(&map, -0.26);
        let frame = clock.advance(&map, -0.24);
        assert_eq!(
            frame.events.as_slice(),
            &[ScanEvent::AboutToChange { scan: 0 }]
        );
        let frame = clock.advance(&map, 0.001);
        assert_eq!(frame.events.as_slice(), &[ScanEvent::Changed { scan: 0 }]);
    }

    #[test]
    fn time_standing_still_emits_nothing() {
        let (map, pps) = fixture();
        let mut clock = ScanClock::new(&map, pps);
        clock.advance(&map, 0.5);
        let frame = clock.advance(&map, 0.5);
        assert!(frame.events.is_empty());
        assert!(frame.playback_seek.is_none());
    }
}
