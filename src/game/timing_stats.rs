use crate::game::judgment::JudgeGrade;
use crate::game::note::NoteRuntime;

#[derive(Copy, Clone, Debug, Default)]
pub struct TimingStats {
    pub mean_abs_ms: f32,
    pub mean_ms: f32,
    pub stddev_ms: f32,
    pub max_abs_ms: f32,
    pub count: usize,
}

/// Accuracy statistics over every judged hit in the session. Misses and
/// breaks carry no meaningful offset and are skipped.
pub fn compute_session_timing_stats(runtimes: &[NoteRuntime]) -> TimingStats {
    // First pass: accumulate sums and maxima over judged hits
    let mut sum_abs = 0.0_f32;
    let mut sum_signed = 0.0_f32;
    let mut max_abs = 0.0_f32;
    let mut count: usize = 0;

    for rt in runtimes {
        if let Some(j) = &rt.result {
            if !j.grade.breaks_combo() {
                let e = j.time_error_ms;
                let a = e.abs();
                sum_abs += a;
                sum_signed += e;
                if a > max_abs {
                    max_abs = a;
                }
                count += 1;
            }
        }
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean_ms = sum_signed / (count as f32);
    let mean_abs_ms = sum_abs / (count as f32);

    // Second pass: sample standard deviation of signed offsets
    let stddev_ms = if count > 1 {
        let mut sum_diff_sq = 0.0_f32;
        for rt in runtimes {
            if let Some(j) = &rt.result {
                if !j.grade.breaks_combo() {
                    let d = j.time_error_ms - mean_ms;
                    sum_diff_sq += d * d;
                }
            }
        }
        (sum_diff_sq / ((count as f32) - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats {
        mean_abs_ms,
        mean_ms,
        stddev_ms,
        max_abs_ms: max_abs,
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::compute_session_timing_stats;
    use crate::game::judgment::{JudgeGrade, Judgment};
    use crate::game::note::NoteRuntime;

    fn judged(ms: f32, grade: JudgeGrade) -> NoteRuntime {
        NoteRuntime {
            result: Some(Judgment {
                time_error_ms: ms,
                grade,
            }),
            ..NoteRuntime::default()
        }
    }

    #[test]
    fn stats_skip_misses_and_breaks() {
        let runtimes = vec![
            judged(10.0, JudgeGrade::Max),
            judged(-10.0, JudgeGrade::Max),
            judged(250.0, JudgeGrade::Break),
            judged(0.0, JudgeGrade::Miss),
            NoteRuntime::default(),
        ];
        let stats = compute_session_timing_stats(&runtimes);
        assert_eq!(stats.count, 2);
        assert!((stats.mean_ms - 0.0).abs() < 1e-6);
        assert!((stats.mean_abs_ms - 10.0).abs() < 1e-6);
        assert!((stats.max_abs_ms - 10.0).abs() < 1e-6);
    }

    #[test]
    fn empty_sessions_yield_default_stats() {
        let stats = compute_session_timing_stats(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean_ms, 0.0);
    }

    #[test]
    fn stddev_uses_the_sample_formula() {
        let runtimes = vec![
            judged(4.0, JudgeGrade::RainbowMax),
            judged(-4.0, JudgeGrade::RainbowMax),
        ];
        let stats = compute_session_timing_stats(&runtimes);
        // Sample variance of {4, -4} is 32, stddev sqrt(32).
        assert!((stats.stddev_ms - 32.0_f32.sqrt()).abs() < 1e-4);
    }
}
