use serde::{Deserialize, Serialize};

use crate::game::judgment::{JudgeGrade, Judgment};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteKind {
    Basic,
    ChainHead,
    ChainNode,
    Hold,
    Drag,
    RepeatHead,
    Repeat,
    RepeatHeadHold,
    RepeatHold,
}

impl NoteKind {
    /// Duration-bearing kinds occupy the `Ongoing` state while sustained.
    #[inline(always)]
    pub const fn has_duration(self) -> bool {
        matches!(
            self,
            Self::Hold | Self::Drag | Self::RepeatHeadHold | Self::RepeatHold
        )
    }

    /// Heads park in `PendingResolve` until their managed group finishes.
    #[inline(always)]
    pub const fn is_repeat_head(self) -> bool {
        matches!(self, Self::RepeatHead | Self::RepeatHeadHold)
    }

    #[inline(always)]
    pub const fn is_managed_repeat(self) -> bool {
        matches!(self, Self::Repeat | Self::RepeatHold)
    }

    /// Kinds whose resolution can arrive via a completed input gesture
    /// instead of a plain press.
    #[inline(always)]
    pub const fn completes_by_gesture(self) -> bool {
        matches!(self, Self::Drag | Self::ChainHead | Self::ChainNode)
    }
}

/// One authored note. Created at pattern load and never mutated; everything
/// that changes during play lives in [`NoteRuntime`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub pulse: i64,
    pub lane: usize,
    pub kind: NoteKind,
    /// Sustain length for duration-bearing kinds, zero otherwise.
    #[serde(default)]
    pub duration_pulses: i64,
    /// Notes sharing an id form one repeat-head's managed group.
    #[serde(default)]
    pub repeat_group: Option<u32>,
    /// A note flagged end-of-scan whose pulse sits exactly on a scan boundary
    /// belongs to the scan that ends there, not the one that begins.
    #[serde(default)]
    pub end_of_scan: bool,
    /// Keysound identifier surfaced on hits and empty hits; playing it is the
    /// host's job.
    #[serde(default)]
    pub keysound: Option<String>,
}

/// Lifecycle of one note within a session.
///
/// Only duration-bearing kinds use `Ongoing`; only repeat heads use
/// `PendingResolve`. Initial state is `Inactive`, terminal is `Resolved`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NoteState {
    Inactive,
    Prepare,
    Active,
    Ongoing,
    PendingResolve,
    Resolved,
}

/// Mutable per-note state, one per note per play session.
#[derive(Clone, Debug)]
pub struct NoteRuntime {
    pub state: NoteState,
    /// The note's own resolution happened. For repeat heads this is set while
    /// the lifecycle still reads `PendingResolve`.
    pub resolved: bool,
    pub result: Option<Judgment>,
    /// Grade banked when a sustain began; awarded if the sustain completes.
    pub sustain_grade: Option<JudgeGrade>,
    /// Signed press offset banked with the sustain grade, for the final
    /// judgment record.
    pub sustain_press_error_ms: f32,
}

impl Default for NoteRuntime {
    fn default() -> Self {
        Self {
            state: NoteState::Inactive,
            resolved: false,
            result: None,
            sustain_grade: None,
            sustain_press_error_ms: 0.0,
        }
    }
}

impl NoteRuntime {
    /// Scan-activation signal for one scan ahead of the note's own scan.
    /// Idempotent: a note hit unusually early may already be `Resolved` when
    /// its nominal activation frame arrives, and the call is then a no-op.
    #[inline(always)]
    pub fn prepare(&mut self) {
        if self.state == NoteState::Inactive {
            self.state = NoteState::Prepare;
        }
    }

    /// Scan-activation signal for the note's own scan. Same idempotence rule
    /// as [`NoteRuntime::prepare`].
    #[inline(always)]
    pub fn activate(&mut self) {
        if matches!(self.state, NoteState::Inactive | NoteState::Prepare) {
            self.state = NoteState::Active;
        }
    }

    /// Whether a judgement request targeting this note specifically may
    /// proceed. Requests against `Inactive`, `Prepare` or terminal notes are
    /// rejected without error; that race is expected.
    #[inline(always)]
    pub fn is_judgeable(&self) -> bool {
        matches!(self.state, NoteState::Active | NoteState::Ongoing)
    }

    #[inline(always)]
    pub fn is_terminal(&self) -> bool {
        self.state == NoteState::Resolved
    }
}

/// A repeat head plus the managed notes it owns.
///
/// Managed notes resolve independently; the head tracks a next-unresolved
/// counter from `managed.len()` down to zero, and only reaches `Resolved`
/// once the counter is exhausted *and* its own resolution has happened. The
/// count is order-independent and never short-circuits.
#[derive(Clone, Debug)]
pub struct RepeatGroup {
    pub head: usize,
    pub managed: Vec<usize>,
    next_unresolved: i64,
}

impl RepeatGroup {
    pub fn new(head: usize, managed: Vec<usize>) -> Self {
        let next_unresolved = managed.len() as i64;
        Self {
            head,
            managed,
            next_unresolved,
        }
    }

    /// Record one managed-note resolution.
    #[inline(always)]
    pub fn record_managed_resolution(&mut self) {
        self.next_unresolved -= 1;
    }

    #[inline(always)]
    pub fn all_managed_resolved(&self) -> bool {
        self.next_unresolved <= 0
    }
}
