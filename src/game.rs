pub mod chart;
pub mod clock;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod scores;
pub mod timeline;
pub mod timing;
pub mod timing_stats;
pub mod timing_windows;
