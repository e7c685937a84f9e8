//! Input edges delivered by the host.
//!
//! The core never reads devices itself. The host translates raw key, mouse or
//! touch events into [`InputEdge`] values, stamps them with the audio time at
//! which they occurred, and queues them on the session. Buffered edges are
//! processed in arrival order inside the next `update` call, which keeps
//! judgments independent of frame delivery.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Mouse,
    Touch,
}

/// What an edge is aimed at.
///
/// Lane-based schemes (keyboard, mouse-per-lane) send a lane index and the
/// session judges the earliest unresolved note in that lane. Free-position
/// schemes run their own hit-testing and send the specific note index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputTarget {
    Lane(usize),
    Note(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Press,
    Release,
    /// A drag or chain gesture ran to its final node. Only meaningful with an
    /// [`InputTarget::Note`] target.
    GestureComplete,
}

#[derive(Clone, Copy, Debug)]
pub struct InputEdge {
    pub target: InputTarget,
    pub kind: InputKind,
    pub source: InputSource,
    /// Audio time (seconds) at which this edge occurred, in the session's
    /// timebase. Filled in by the host from its audio device clock so that
    /// judgments are not tied to frame timing.
    pub event_audio_time: f32,
}
