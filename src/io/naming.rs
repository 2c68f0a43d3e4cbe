//! Session map file naming.
//!
//! `<base>_map.csv`, or `<base>_<capture time>_map.csv` for live sessions so a
//! new recording never overwrites an earlier one. `<base>` is the configured
//! video/session name with its 4-character extension (`.mp4`) removed.

use chrono::NaiveDateTime;

/// Format of the capture time embedded in live-session file names.
pub const CAPTURE_TIME_FORMAT: &str = "%Y-%m-%d_%I:%M:%S %p";

const EXTENSION_LEN: usize = 4;

/// Strip the trailing 4-character extension. Names shorter than that yield "".
pub fn session_base_name(video_name: &str) -> &str {
    match video_name.char_indices().rev().nth(EXTENSION_LEN - 1) {
        Some((idx, _)) => &video_name[..idx],
        None => "",
    }
}

pub fn map_file_name(video_name: &str, capture_time: Option<NaiveDateTime>) -> String {
    let base = session_base_name(video_name);
    match capture_time {
        Some(t) => format!("{}_{}_map.csv", base, t.format(CAPTURE_TIME_FORMAT)),
        None => format!("{}_map.csv", base),
    }
}
