use serde::{Deserialize, Serialize};

use crate::game::judgment::JudgeGrade;

/// Per-grade resolution counts. One field per grade so snapshots serialize
/// with stable names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementTally {
    pub rainbow_max: u32,
    pub max: u32,
    pub cool: u32,
    pub good: u32,
    pub miss: u32,
    pub breaks: u32,
}

impl JudgementTally {
    #[inline(always)]
    pub fn add(&mut self, grade: JudgeGrade) {
        match grade {
            JudgeGrade::RainbowMax => self.rainbow_max += 1,
            JudgeGrade::Max => self.max += 1,
            JudgeGrade::Cool => self.cool += 1,
            JudgeGrade::Good => self.good += 1,
            JudgeGrade::Miss => self.miss += 1,
            JudgeGrade::Break => self.breaks += 1,
        }
    }

    #[inline(always)]
    pub fn count(&self, grade: JudgeGrade) -> u32 {
        match grade {
            JudgeGrade::RainbowMax => self.rainbow_max,
            JudgeGrade::Max => self.max,
            JudgeGrade::Cool => self.cool,
            JudgeGrade::Good => self.good,
            JudgeGrade::Miss => self.miss,
            JudgeGrade::Break => self.breaks,
        }
    }

    #[inline(always)]
    pub fn total(&self) -> u32 {
        self.rainbow_max + self.max + self.cool + self.good + self.miss + self.breaks
    }
}

/// Running score state for one session. The accumulation contract is the
/// core's only scoring guarantee: tallies count every resolution, combo
/// resets strictly on Miss/Break, and the fever bonus only grows.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScoreState {
    pub tally: JudgementTally,
    pub current_combo: u32,
    pub max_combo: u32,
    pub fever_bonus_accumulated: u64,
}

impl ScoreState {
    pub fn record(&mut self, grade: JudgeGrade) {
        self.tally.add(grade);
        if grade.breaks_combo() {
            self.current_combo = 0;
        } else {
            self.current_combo += 1;
            self.max_combo = self.max_combo.max(self.current_combo);
        }
    }

    pub fn add_fever_bonus(&mut self, amount: u64) {
        self.fever_bonus_accumulated = self.fever_bonus_accumulated.saturating_add(amount);
    }
}

/// Final-score weighting is ruleset policy, not a core contract; hosts swap
/// in their own formula over the raw tallies.
pub trait ScorePolicy {
    fn total_score(&self, score: &ScoreState) -> u64;
}

/// Reference policy: fixed per-grade weights plus the accumulated fever
/// bonus. Weights are non-negative, so the total never decreases as tallies
/// grow.
#[derive(Clone, Copy, Debug)]
pub struct BasicScorePolicy {
    pub rainbow_max: u64,
    pub max: u64,
    pub cool: u64,
    pub good: u64,
}

impl Default for BasicScorePolicy {
    fn default() -> Self {
        Self {
            rainbow_max: 300,
            max: 290,
            cool: 100,
            good: 50,
        }
    }
}

impl ScorePolicy for BasicScorePolicy {
    fn total_score(&self, score: &ScoreState) -> u64 {
        let t = &score.tally;
        u64::from(t.rainbow_max) * self.rainbow_max
            + u64::from(t.max) * self.max
            + u64::from(t.cool) * self.cool
            + u64::from(t.good) * self.good
            + score.fever_bonus_accumulated
    }
}
