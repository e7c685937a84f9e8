use crate::game::note::Note;

/// Immutable, per-lane, pulse-ordered view of a pattern's notes.
///
/// Indices refer into the pattern's note list. Built once per session and
/// shared by activation scheduling, FIFO lane judging and the
/// nearest-upcoming-note lookup used for empty-hit feedback.
#[derive(Clone, Debug, Default)]
pub struct NoteTimeline {
    lanes: Vec<Vec<usize>>,
}

impl NoteTimeline {
    pub fn build(notes: &[Note]) -> Self {
        let num_lanes = notes.iter().map(|n| n.lane + 1).max().unwrap_or(0);
        let mut lanes = vec![Vec::new(); num_lanes];
        for (idx, note) in notes.iter().enumerate() {
            lanes[note.lane].push(idx);
        }
        for lane in &mut lanes {
            lane.sort_by_key(|&idx| (notes[idx].pulse, idx));
        }
        Self { lanes }
    }

    #[inline(always)]
    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }

    /// Note indices in the lane, pulse-ascending. Out-of-range lanes are
    /// simply empty.
    #[inline(always)]
    pub fn lane(&self, lane: usize) -> &[usize] {
        self.lanes.get(lane).map_or(&[], |v| v.as_slice())
    }

    /// First note in the lane at or after `pulse`, for empty-hit feedback.
    pub fn next_at_or_after(&self, lane: usize, pulse: i64, notes: &[Note]) -> Option<usize> {
        let list = self.lane(lane);
        let pos = list.partition_point(|&idx| notes[idx].pulse < pulse);
        list.get(pos).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::NoteTimeline;
    use crate::game::note::{Note, NoteKind};

    fn note(pulse: i64, lane: usize) -> Note {
        Note {
            pulse,
            lane,
            kind: NoteKind::Basic,
            duration_pulses: 0,
            repeat_group: None,
            end_of_scan: false,
            keysound: None,
        }
    }

    #[test]
    fn lanes_are_pulse_sorted_views() {
        let notes = vec![note(480, 1), note(0, 0), note(240, 1), note(960, 0)];
        let timeline = NoteTimeline::build(&notes);
        assert_eq!(timeline.num_lanes(), 2);
        assert_eq!(timeline.lane(0), &[1, 3]);
        assert_eq!(timeline.lane(1), &[2, 0]);
        assert!(timeline.lane(7).is_empty());
    }

    #[test]
    fn next_at_or_after_finds_the_nearest_upcoming_note() {
        let notes = vec![note(0, 0), note(240, 0), note(480, 0)];
        let timeline = NoteTimeline::build(&notes);
        assert_eq!(timeline.next_at_or_after(0, -50, &notes), Some(0));
        assert_eq!(timeline.next_at_or_after(0, 240, &notes), Some(1));
        assert_eq!(timeline.next_at_or_after(0, 241, &notes), Some(2));
        assert_eq!(timeline.next_at_or_after(0, 481, &notes), None);
        assert_eq!(timeline.next_at_or_after(3, 0, &notes), None);
    }

    #[test]
    fn same_pulse_notes_keep_authoring_order() {
        let notes = vec![note(240, 0), note(240, 0)];
        let timeline = NoteTimeline::build(&notes);
        assert_eq!(timeline.lane(0), &[0, 1]);
    }
}
