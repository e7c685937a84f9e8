use serde::{Deserialize, Serialize};

use crate::game::note::Note;
use crate::game::timing::floor_div;

/// A tempo change on the pulse timeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TempoEvent {
    pub pulse: i64,
    pub beats_per_minute: f32,
}

/// Fully parsed pattern data for one play session. Loading and persistence
/// happen elsewhere; this struct is immutable once a session starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pattern {
    /// Pulse-sorted, first event at pulse 0.
    pub tempo_events: Vec<TempoEvent>,
    /// Pulses per beat; the smallest indivisible unit of musical position.
    pub pulses_per_beat: i64,
    /// Beats per scan; one scan is one "page" of notes.
    pub beats_per_scan: i64,
    /// Seconds between backing-track start and the first beat.
    #[serde(default)]
    pub first_beat_offset_seconds: f32,
    pub notes: Vec<Note>,
}

impl Pattern {
    #[inline(always)]
    pub const fn pulses_per_scan(&self) -> i64 {
        self.pulses_per_beat * self.beats_per_scan
    }

    /// Load-time validation. The runtime assumes a validated pattern and
    /// performs no defensive correction after this point.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pulses_per_beat <= 0 {
            return Err("pulses_per_beat must be positive");
        }
        if self.beats_per_scan <= 0 {
            return Err("beats_per_scan must be positive");
        }
        let Some(first) = self.tempo_events.first() else {
            return Err("pattern has no tempo events");
        };
        if first.pulse != 0 {
            return Err("first tempo event must sit at pulse 0");
        }
        for event in &self.tempo_events {
            // Written so NaN fails too.
            if !(event.beats_per_minute > 0.0) {
                return Err("tempo events must carry a positive BPM");
            }
        }
        for pair in self.tempo_events.windows(2) {
            if pair[1].pulse <= pair[0].pulse {
                return Err("tempo events must be strictly pulse-sorted");
            }
        }
        for note in &self.notes {
            if note.pulse < 0 {
                return Err("notes cannot sit before pulse 0");
            }
            if note.kind.has_duration() && note.duration_pulses <= 0 {
                return Err("duration-bearing notes need a positive duration");
            }
            if note.kind.is_managed_repeat() && note.repeat_group.is_none() {
                return Err("repeat notes must name a repeat group");
            }
            if note.kind.is_repeat_head() && note.repeat_group.is_none() {
                return Err("repeat heads must name a repeat group");
            }
        }
        Ok(())
    }

    /// Scan index a note activates in. End-of-scan notes sitting exactly on a
    /// scan boundary belong to the scan that ends there.
    pub fn scan_of_note(&self, note: &Note) -> i64 {
        let pps = self.pulses_per_scan();
        let scan = floor_div(note.pulse, pps);
        if note.end_of_scan && note.pulse % pps == 0 {
            scan - 1
        } else {
            scan
        }
    }
}
