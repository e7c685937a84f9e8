use serde::{Deserialize, Serialize};

use crate::game::timing_windows;

/// Discrete accuracy grade of one resolved note, best first.
///
/// `Break` is both the outermost hit window and the grade assigned by the
/// automatic break sweep when input never arrives. `Miss` is reserved for
/// sustained notes dropped before their duration completes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JudgeGrade {
    RainbowMax,
    Max,
    Cool,
    Good,
    Miss,
    Break,
}

impl JudgeGrade {
    /// Combo resets on exactly these grades; every other grade extends it.
    #[inline(always)]
    pub const fn breaks_combo(self) -> bool {
        matches!(self, Self::Miss | Self::Break)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Judgment {
    pub time_error_ms: f32,
    pub grade: JudgeGrade,
}

/// Classify a signed hit offset (seconds) into a grade using the nested
/// windows, tightest first.
///
/// Returns `None` outside the Break window: such an input does not match the
/// note at all, and the caller should try the next candidate or treat the
/// press as an empty hit.
#[inline(always)]
pub fn classify_offset_s(offset_s: f32) -> Option<JudgeGrade> {
    let abs = offset_s.abs();
    let w = timing_windows::nested_windows_s();
    if abs <= w[0] {
        Some(JudgeGrade::RainbowMax)
    } else if abs <= w[1] {
        Some(JudgeGrade::Max)
    } else if abs <= w[2] {
        Some(JudgeGrade::Cool)
    } else if abs <= w[3] {
        Some(JudgeGrade::Good)
    } else if abs <= w[4] {
        Some(JudgeGrade::Break)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{JudgeGrade, classify_offset_s};

    #[test]
    fn windows_nest_tightest_first() {
        let note_time = 10.0_f32;
        let expect = [
            (10.02, JudgeGrade::RainbowMax),
            (10.04, JudgeGrade::Max),
            (10.08, JudgeGrade::Cool),
            (10.12, JudgeGrade::Good),
            (10.20, JudgeGrade::Break),
        ];
        for (input, grade) in expect {
            assert_eq!(
                classify_offset_s(input - note_time),
                Some(grade),
                "input at {input} should grade as {grade:?}"
            );
        }
    }

    #[test]
    fn boundaries_resolve_to_the_tighter_band() {
        assert_eq!(classify_offset_s(0.03), Some(JudgeGrade::RainbowMax));
        assert_eq!(classify_offset_s(0.05), Some(JudgeGrade::Max));
        assert_eq!(classify_offset_s(0.10), Some(JudgeGrade::Cool));
        assert_eq!(classify_offset_s(0.15), Some(JudgeGrade::Good));
        assert_eq!(classify_offset_s(0.30), Some(JudgeGrade::Break));
    }

    #[test]
    fn early_and_late_offsets_grade_identically() {
        assert_eq!(classify_offset_s(-0.04), classify_offset_s(0.04));
        assert_eq!(classify_offset_s(-0.22), classify_offset_s(0.22));
    }

    #[test]
    fn offsets_outside_the_break_window_do_not_match() {
        assert_eq!(classify_offset_s(0.31), None);
        assert_eq!(classify_offset_s(-2.0), None);
    }

    #[test]
    fn only_miss_and_break_reset_combo() {
        assert!(JudgeGrade::Miss.breaks_combo());
        assert!(JudgeGrade::Break.breaks_combo());
        assert!(!JudgeGrade::RainbowMax.breaks_combo());
        assert!(!JudgeGrade::Max.breaks_combo());
        assert!(!JudgeGrade::Cool.breaks_combo());
        assert!(!JudgeGrade::Good.breaks_combo());
    }
}
