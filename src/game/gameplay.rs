//! The playable session: owns the clock, every note's lifecycle, judging
//! and scoring, and turns sampled time plus queued input edges into a
//! stream of events the host renders from.
//!
//! `update` runs a fixed order each frame: advance the clock, apply scan
//! boundary transitions, start playback on the zero crossing, consume
//! input, complete lapsed sustains, then sweep unhit notes into breaks.
//! Everything is driven by the sampled elapsed audio time, so two sessions
//! fed the same pattern and the same edge script produce identical events.

use std::collections::VecDeque;
use std::sync::Arc;

use bitflags::bitflags;
use log::{debug, info};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::core::audio::AudioControl;
use crate::core::input::{InputEdge, InputKind, InputTarget};
use crate::game::chart::Pattern;
use crate::game::clock::{ScanClock, ScanEvent};
use crate::game::judgment::{self, JudgeGrade, Judgment};
use crate::game::note::{NoteRuntime, NoteState, RepeatGroup};
use crate::game::scores::{ScorePolicy, ScoreState};
use crate::game::timeline::NoteTimeline;
use crate::game::timing::{TempoMap, floor_div};
use crate::game::timing_stats::{self, TimingStats};
use crate::game::timing_windows;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u32 {
        /// Ignore queued input and resolve every note perfectly at its own
        /// time.
        const AUTO_PLAY = 1 << 0;
    }
}

/// What one frame produced, in the order it happened.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Logical time crossed zero; the backing track was started with this
    /// seek so audio stays phase-locked to the clock.
    PlaybackStarted { seek_seconds: f32 },
    ScanAboutToChange { scan: i64 },
    ScanChanged { scan: i64 },
    /// Emitted every frame for smooth scanline interpolation.
    FloatPulseChanged { float_pulse: f32 },
    NoteResolved { note_index: usize, grade: JudgeGrade },
    /// A press landed on no judgeable note. Carries the keysound of the
    /// nearest upcoming note in the lane so hosts can still play feedback.
    EmptyHit { lane: usize, keysound: Option<String> },
    /// The clock moved past the last playable scan. Fired once.
    SessionComplete,
}

pub struct State {
    pub pattern: Arc<Pattern>,
    pub tempo_map: Arc<TempoMap>,
    pub timeline: NoteTimeline,
    pub scan_clock: ScanClock,
    pub runtimes: Vec<NoteRuntime>,
    pub score: ScoreState,
    pub modifiers: Modifiers,
    pub paused: bool,

    repeat_groups: Vec<RepeatGroup>,
    group_of_note: Vec<Option<usize>>,
    /// Note start and end times, precomputed so judging never walks the
    /// tempo map.
    note_time_cache: Vec<f32>,
    note_end_time_cache: Vec<Option<f32>>,
    notes_by_scan: FxHashMap<i64, Vec<usize>>,
    /// All note indices ordered by start time; the break sweep and
    /// auto-play each keep a cursor into it.
    break_order: Vec<usize>,
    next_break_cursor: usize,
    autoplay_cursor: usize,
    /// Per-lane cursor into the timeline, skipped past resolved notes so a
    /// lane press always lands on the earliest live one.
    lane_fifo_cursor: Vec<usize>,
    active_sustains: Vec<usize>,
    pending_edges: VecDeque<InputEdge>,
    last_playable_scan: i64,
    playback_started: bool,
    completed: bool,
}

/// Build a session from a validated pattern. Fails if the pattern itself is
/// malformed or a repeat group lacks a head note.
pub fn init(
    pattern: Arc<Pattern>,
    backing_track_length_seconds: f32,
    modifiers: Modifiers,
) -> Result<State, &'static str> {
    let tempo_map = Arc::new(TempoMap::from_pattern(&pattern)?);
    let pps = pattern.pulses_per_scan();
    let timeline = NoteTimeline::build(&pattern.notes);
    let note_count = pattern.notes.len();

    let mut note_time_cache = Vec::with_capacity(note_count);
    let mut note_end_time_cache = Vec::with_capacity(note_count);
    let mut notes_by_scan: FxHashMap<i64, Vec<usize>> = FxHashMap::default();
    for (i, note) in pattern.notes.iter().enumerate() {
        note_time_cache.push(tempo_map.pulse_to_time(note.pulse as f32));
        note_end_time_cache.push(if note.kind.has_duration() {
            Some(tempo_map.pulse_to_time((note.pulse + note.duration_pulses) as f32))
        } else {
            None
        });
        notes_by_scan
            .entry(pattern.scan_of_note(note))
            .or_default()
            .push(i);
    }

    let mut members: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
    for (i, note) in pattern.notes.iter().enumerate() {
        if let Some(id) = note.repeat_group {
            members.entry(id).or_default().push(i);
        }
    }
    // Sorted by group id so group indices never depend on hash order.
    let mut grouped: Vec<(u32, Vec<usize>)> = members.into_iter().collect();
    grouped.sort_by_key(|(id, _)| *id);
    let mut repeat_groups = Vec::with_capacity(grouped.len());
    let mut group_of_note = vec![None; note_count];
    for (id, mut idxs) in grouped {
        idxs.sort_by_key(|&i| (pattern.notes[i].pulse, i));
        let Some(head) = idxs
            .iter()
            .copied()
            .find(|&i| pattern.notes[i].kind.is_repeat_head())
        else {
            return Err("repeat group has no head note");
        };
        let managed: Vec<usize> = idxs
            .iter()
            .copied()
            .filter(|&i| pattern.notes[i].kind.is_managed_repeat())
            .collect();
        let group = repeat_groups.len();
        for &i in &idxs {
            group_of_note[i] = Some(group);
        }
        debug!(
            "repeat group {id}: head at pulse {}, {} managed notes",
            pattern.notes[head].pulse,
            managed.len()
        );
        repeat_groups.push(RepeatGroup::new(head, managed));
    }

    let mut break_order: Vec<usize> = (0..note_count).collect();
    break_order.sort_by(|&a, &b| {
        note_time_cache[a]
            .total_cmp(&note_time_cache[b])
            .then(a.cmp(&b))
    });

    let mut last_playable_scan = i64::MIN;
    for note in &pattern.notes {
        let end_pulse = note.pulse + note.duration_pulses.max(0);
        last_playable_scan = last_playable_scan.max(floor_div(end_pulse, pps));
    }
    let track_end_pulse = tempo_map.time_to_pulse(backing_track_length_seconds).floor() as i64;
    last_playable_scan = last_playable_scan.max(floor_div(track_end_pulse, pps));

    let scan_clock = ScanClock::new(&tempo_map, pps);
    let num_lanes = timeline.num_lanes();
    info!(
        "session ready: {note_count} notes across {num_lanes} lanes, scans {}..={last_playable_scan}, modifiers {modifiers:?}",
        scan_clock.initial_scan()
    );

    Ok(State {
        pattern,
        tempo_map,
        timeline,
        scan_clock,
        runtimes: vec![NoteRuntime::default(); note_count],
        score: ScoreState::default(),
        modifiers,
        paused: false,
        repeat_groups,
        group_of_note,
        note_time_cache,
        note_end_time_cache,
        notes_by_scan,
        break_order,
        next_break_cursor: 0,
        autoplay_cursor: 0,
        lane_fifo_cursor: vec![0; num_lanes],
        active_sustains: Vec::new(),
        pending_edges: VecDeque::new(),
        last_playable_scan,
        playback_started: false,
        completed: false,
    })
}

/// Queue an input edge for the next `update`. Edges are consumed in queue
/// order, judged against their own timestamps.
pub fn queue_input_edge(state: &mut State, edge: InputEdge) {
    state.pending_edges.push_back(edge);
}

pub fn pause(state: &mut State, audio: &mut dyn AudioControl) {
    if state.paused {
        return;
    }
    state.paused = true;
    if state.playback_started {
        audio.pause();
    }
    info!(
        "session paused at {:.3}s",
        state.scan_clock.clock.elapsed_audio_time
    );
}

pub fn resume(state: &mut State, audio: &mut dyn AudioControl) {
    if !state.paused {
        return;
    }
    state.paused = false;
    if state.playback_started {
        audio.resume();
    }
    info!(
        "session resumed at {:.3}s",
        state.scan_clock.clock.elapsed_audio_time
    );
}

/// One frame. `elapsed_audio_time` is the host's free-running session clock
/// (negative during pre-roll). The host must hold that clock still while
/// paused; a paused session ignores the frame entirely.
pub fn update(
    state: &mut State,
    elapsed_audio_time: f32,
    audio: &mut dyn AudioControl,
) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    if state.paused {
        return events;
    }

    let frame = state
        .scan_clock
        .advance(&state.tempo_map, elapsed_audio_time);

    if let Some(seek) = frame.playback_seek
        && !state.playback_started
    {
        state.playback_started = true;
        audio.play(seek);
        events.push(SessionEvent::PlaybackStarted { seek_seconds: seek });
    }

    for ev in &frame.events {
        match *ev {
            ScanEvent::AboutToChange { scan } => {
                activate_scan(state, scan);
                events.push(SessionEvent::ScanAboutToChange { scan });
            }
            ScanEvent::Changed { scan } => {
                activate_scan(state, scan);
                prepare_scan(state, scan + 1);
                events.push(SessionEvent::ScanChanged { scan });
            }
        }
    }
    events.push(SessionEvent::FloatPulseChanged {
        float_pulse: state.scan_clock.clock.float_pulse,
    });

    if state.modifiers.contains(Modifiers::AUTO_PLAY) {
        state.pending_edges.clear();
        run_autoplay(state, &mut events, elapsed_audio_time);
    } else {
        process_pending_input(state, &mut events);
    }

    complete_lapsed_sustains(state, &mut events, elapsed_audio_time);
    apply_automatic_breaks(state, &mut events, elapsed_audio_time);

    if !state.completed && state.scan_clock.clock.scan > state.last_playable_scan {
        state.completed = true;
        info!(
            "session complete at scan {} (combo peak {}, {} judgements)",
            state.scan_clock.clock.scan,
            state.score.max_combo,
            state.score.tally.total()
        );
        events.push(SessionEvent::SessionComplete);
    }

    events
}

/// Offset statistics over every note judged so far, breaks excluded.
pub fn session_timing_stats(state: &State) -> TimingStats {
    timing_stats::compute_session_timing_stats(&state.runtimes)
}

pub fn total_score(state: &State, policy: &dyn ScorePolicy) -> u64 {
    policy.total_score(&state.score)
}

fn prepare_scan(state: &mut State, scan: i64) {
    if let Some(idxs) = state.notes_by_scan.get(&scan) {
        for &i in idxs {
            state.runtimes[i].prepare();
        }
    }
}

fn activate_scan(state: &mut State, scan: i64) {
    if let Some(idxs) = state.notes_by_scan.get(&scan) {
        for &i in idxs {
            state.runtimes[i].activate();
        }
    }
}

fn process_pending_input(state: &mut State, events: &mut Vec<SessionEvent>) {
    while let Some(edge) = state.pending_edges.pop_front() {
        let t = edge.event_audio_time;
        match (edge.kind, edge.target) {
            (InputKind::Press, InputTarget::Lane(lane)) => judge_lane_press(state, events, lane, t),
            (InputKind::Press, InputTarget::Note(idx)) => judge_note_press(state, events, idx, t),
            (InputKind::Release, InputTarget::Lane(lane)) => release_lane(state, events, lane, t),
            (InputKind::Release, InputTarget::Note(idx)) => release_note(state, events, idx, t),
            (InputKind::GestureComplete, InputTarget::Note(idx)) => {
                complete_gesture(state, events, idx, t);
            }
            (InputKind::GestureComplete, InputTarget::Lane(_)) => {}
        }
    }
}

/// Earliest unresolved note in the lane, advancing the cursor past anything
/// already judged.
fn first_unresolved_in_lane(state: &mut State, lane: usize) -> Option<usize> {
    if lane >= state.timeline.num_lanes() {
        return None;
    }
    let order = state.timeline.lane(lane);
    let cursor = &mut state.lane_fifo_cursor[lane];
    while *cursor < order.len() && state.runtimes[order[*cursor]].resolved {
        *cursor += 1;
    }
    order.get(*cursor).copied()
}

fn judge_lane_press(state: &mut State, events: &mut Vec<SessionEvent>, lane: usize, t: f32) {
    let Some(idx) = first_unresolved_in_lane(state, lane) else {
        events.push(SessionEvent::EmptyHit {
            lane,
            keysound: None,
        });
        return;
    };
    if state.runtimes[idx].state == NoteState::Ongoing {
        return;
    }
    let offset_s = t - state.note_time_cache[idx];
    match judgment::classify_offset_s(offset_s) {
        Some(grade) => land_hit(state, events, idx, grade, offset_s),
        None => {
            // Too far from the candidate to judge: feedback only.
            let keysound = state
                .timeline
                .next_at_or_after(lane, state.scan_clock.clock.pulse, &state.pattern.notes)
                .and_then(|i| state.pattern.notes[i].keysound.clone());
            events.push(SessionEvent::EmptyHit { lane, keysound });
        }
    }
}

/// A press aimed at one specific note, as delivered by pointer or touch
/// hit-testing. Unlike a lane press this refuses anything the lifecycle has
/// not made judgeable yet; stale requests racing a resolution are expected
/// and dropped silently.
fn judge_note_press(state: &mut State, events: &mut Vec<SessionEvent>, idx: usize, t: f32) {
    if idx >= state.runtimes.len() || !state.runtimes[idx].is_judgeable() {
        debug!("dropped judgement request for note {idx}");
        return;
    }
    let offset_s = t - state.note_time_cache[idx];
    if let Some(grade) = judgment::classify_offset_s(offset_s) {
        land_hit(state, events, idx, grade, offset_s);
    }
}

fn land_hit(
    state: &mut State,
    events: &mut Vec<SessionEvent>,
    idx: usize,
    grade: JudgeGrade,
    offset_s: f32,
) {
    if state.pattern.notes[idx].kind.has_duration() {
        begin_sustain(state, idx, grade, offset_s);
    } else {
        resolve_note(state, events, idx, grade, offset_s * 1000.0);
    }
}

fn begin_sustain(state: &mut State, idx: usize, grade: JudgeGrade, offset_s: f32) {
    let rt = &mut state.runtimes[idx];
    rt.state = NoteState::Ongoing;
    rt.sustain_grade = Some(grade);
    rt.sustain_press_error_ms = offset_s * 1000.0;
    state.active_sustains.push(idx);
    debug!(
        "sustain started on note {idx} (pulse {}, banked {grade:?})",
        state.pattern.notes[idx].pulse
    );
}

fn release_lane(state: &mut State, events: &mut Vec<SessionEvent>, lane: usize, t: f32) {
    let Some(pos) = state
        .active_sustains
        .iter()
        .position(|&i| state.pattern.notes[i].lane == lane)
    else {
        return;
    };
    let idx = state.active_sustains.remove(pos);
    finish_sustain(state, events, idx, t);
}

fn release_note(state: &mut State, events: &mut Vec<SessionEvent>, idx: usize, t: f32) {
    let Some(pos) = state.active_sustains.iter().position(|&i| i == idx) else {
        return;
    };
    state.active_sustains.remove(pos);
    finish_sustain(state, events, idx, t);
}

/// A release inside the grace tail (one Good window before the end) keeps
/// the banked press grade; letting go earlier drops the note to a Miss.
fn finish_sustain(state: &mut State, events: &mut Vec<SessionEvent>, idx: usize, release_time: f32) {
    let end_time = state.note_end_time_cache[idx].unwrap_or(state.note_time_cache[idx]);
    let banked = state.runtimes[idx].sustain_grade.unwrap_or(JudgeGrade::Good);
    let press_error_ms = state.runtimes[idx].sustain_press_error_ms;
    if release_time >= end_time - timing_windows::GOOD_WINDOW_S {
        resolve_note(state, events, idx, banked, press_error_ms);
    } else {
        debug!(
            "sustain on note {idx} dropped {:.3}s early",
            end_time - release_time
        );
        resolve_note(state, events, idx, JudgeGrade::Miss, press_error_ms);
    }
}

fn complete_gesture(state: &mut State, events: &mut Vec<SessionEvent>, idx: usize, t: f32) {
    if idx >= state.runtimes.len() || !state.pattern.notes[idx].kind.completes_by_gesture() {
        return;
    }
    match state.runtimes[idx].state {
        // A drag followed to its final node completes with the banked grade
        // regardless of where the pointer lets go.
        NoteState::Ongoing => {
            if let Some(pos) = state.active_sustains.iter().position(|&i| i == idx) {
                state.active_sustains.remove(pos);
            }
            let banked = state.runtimes[idx].sustain_grade.unwrap_or(JudgeGrade::Good);
            let press_error_ms = state.runtimes[idx].sustain_press_error_ms;
            resolve_note(state, events, idx, banked, press_error_ms);
        }
        // Chain nodes resolve as the held gesture sweeps over them.
        NoteState::Prepare | NoteState::Active => {
            let offset_s = t - state.note_time_cache[idx];
            if let Some(grade) = judgment::classify_offset_s(offset_s) {
                resolve_note(state, events, idx, grade, offset_s * 1000.0);
            }
        }
        _ => {}
    }
}

/// Sweep every note whose full judgement window has lapsed unhit into a
/// Break. The cursor walks notes in start-time order exactly once; sustains
/// in flight and resolved notes are skipped.
fn apply_automatic_breaks(state: &mut State, events: &mut Vec<SessionEvent>, now: f32) {
    let cutoff = now - timing_windows::BREAK_WINDOW_S;
    while state.next_break_cursor < state.break_order.len() {
        let idx = state.break_order[state.next_break_cursor];
        let note_time = state.note_time_cache[idx];
        if note_time > cutoff {
            break;
        }
        state.next_break_cursor += 1;
        let rt = &state.runtimes[idx];
        if rt.resolved || rt.state == NoteState::Ongoing {
            continue;
        }
        info!(
            "BREAK: note {idx} at pulse {} lapsed unhit",
            state.pattern.notes[idx].pulse
        );
        resolve_note(state, events, idx, JudgeGrade::Break, (now - note_time) * 1000.0);
    }
}

fn complete_lapsed_sustains(state: &mut State, events: &mut Vec<SessionEvent>, now: f32) {
    let mut due: SmallVec<[usize; 4]> = SmallVec::new();
    {
        let end_times = &state.note_end_time_cache;
        let start_times = &state.note_time_cache;
        state.active_sustains.retain(|&idx| {
            if now >= end_times[idx].unwrap_or(start_times[idx]) {
                due.push(idx);
                false
            } else {
                true
            }
        });
    }
    for idx in due {
        let banked = state.runtimes[idx].sustain_grade.unwrap_or(JudgeGrade::Good);
        let press_error_ms = state.runtimes[idx].sustain_press_error_ms;
        resolve_note(state, events, idx, banked, press_error_ms);
    }
}

fn run_autoplay(state: &mut State, events: &mut Vec<SessionEvent>, now: f32) {
    while state.autoplay_cursor < state.break_order.len() {
        let idx = state.break_order[state.autoplay_cursor];
        if state.note_time_cache[idx] > now {
            break;
        }
        state.autoplay_cursor += 1;
        if state.runtimes[idx].resolved {
            continue;
        }
        state.runtimes[idx].activate();
        resolve_note(state, events, idx, JudgeGrade::RainbowMax, 0.0);
    }
}

/// Terminal step of every note's lifecycle. Records the judgment, scores
/// it, emits the event, and drives repeat-group bookkeeping: managed notes
/// count down their group, heads park in `PendingResolve` until the whole
/// group is done.
fn resolve_note(
    state: &mut State,
    events: &mut Vec<SessionEvent>,
    idx: usize,
    grade: JudgeGrade,
    time_error_ms: f32,
) {
    if state.runtimes[idx].resolved {
        return;
    }
    let kind = state.pattern.notes[idx].kind;
    {
        let rt = &mut state.runtimes[idx];
        rt.resolved = true;
        rt.result = Some(Judgment {
            time_error_ms,
            grade,
        });
        rt.sustain_grade = None;
        rt.state = if kind.is_repeat_head() {
            NoteState::PendingResolve
        } else {
            NoteState::Resolved
        };
    }
    state.score.record(grade);
    debug!(
        "resolved note {idx}: pulse {}, lane {}, {kind:?}, {grade:?}, {time_error_ms:+.2}ms",
        state.pattern.notes[idx].pulse, state.pattern.notes[idx].lane
    );
    events.push(SessionEvent::NoteResolved {
        note_index: idx,
        grade,
    });

    if let Some(group) = state.group_of_note[idx] {
        if kind.is_managed_repeat() {
            state.repeat_groups[group].record_managed_resolution();
        }
        let head = state.repeat_groups[group].head;
        if state.repeat_groups[group].all_managed_resolved()
            && state.runtimes[head].resolved
            && state.runtimes[head].state == NoteState::PendingResolve
        {
            state.runtimes[head].state = NoteState::Resolved;
            debug!(
                "repeat head at pulse {} finalized",
                state.pattern.notes[head].pulse
            );
        }
    }
}
