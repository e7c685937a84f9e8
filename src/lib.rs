//! Deterministic scan-based rhythm engine core.
//!
//! Converts musical position (pulses along a tempo timeline) to and from
//! audio time, drives every note through its activation/resolution lifecycle
//! in sync with that timeline, and judges buffered player input against
//! nested per-note timing windows to produce a running score.
//!
//! The crate is an in-process engine: the host owns the window, the audio
//! device and the render loop, samples its monotonic audio clock once per
//! frame, and calls [`game::gameplay::update`]. Everything in here is
//! single-threaded and reproducible; given the same elapsed-time samples and
//! the same queued input edges, two runs produce identical events and scores.

pub mod core;
pub mod game;
