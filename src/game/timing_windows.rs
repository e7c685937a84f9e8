// Shared timing window definitions to keep judgment and the break sweep in sync.

// All windows are in seconds, nested tightest first. Boundaries are inclusive
// toward the tighter band, so an offset of exactly 0.05 is still a Max.
pub const RAINBOW_MAX_WINDOW_S: f32 = 0.03;
pub const MAX_WINDOW_S: f32 = 0.05;
pub const COOL_WINDOW_S: f32 = 0.10;
pub const GOOD_WINDOW_S: f32 = 0.15;
pub const BREAK_WINDOW_S: f32 = 0.30;

#[inline(always)]
pub fn nested_windows_s() -> [f32; 5] {
    [
        RAINBOW_MAX_WINDOW_S,
        MAX_WINDOW_S,
        COOL_WINDOW_S,
        GOOD_WINDOW_S,
        BREAK_WINDOW_S,
    ]
}

#[inline(always)]
pub fn nested_windows_ms() -> [f32; 5] {
    let s = nested_windows_s();
    [
        s[0] * 1000.0,
        s[1] * 1000.0,
        s[2] * 1000.0,
        s[3] * 1000.0,
        s[4] * 1000.0,
    ]
}
