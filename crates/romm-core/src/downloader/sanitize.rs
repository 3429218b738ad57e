//! Temp-directory and final-filename sanitization.
//!
//! Strips hostile characters, then truncates on a char boundary rather than
//! a raw byte offset.

const TEMP_NAME_MAX: usize = 12;
const DEFAULT_EXTENSION: &str = "nsp";

fn strip_hostile_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() && *c != '/' && *c != '\\' && *c != ':')
        .collect()
}

fn truncate_at_char_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Sanitize a title (or fall back to the rom id) into the temp
/// subdirectory name `<name>.tmp`.
pub fn temp_dir_name(title: &str, rom_id: &str) -> String {
    let cleaned = strip_hostile_chars(title.trim());
    let base = if cleaned.is_empty() { strip_hostile_chars(rom_id) } else { cleaned };
    let truncated = truncate_at_char_boundary(&base, TEMP_NAME_MAX);
    format!("{truncated}.tmp")
}

/// The final output filename: the sanitized title plus the preferred
/// filename's extension, defaulting to `.nsp`.
pub fn final_filename(title: &str, preferred_filename: &str) -> String {
    let cleaned = strip_hostile_chars(title.trim());
    let ext = preferred_filename.rsplit_once('.').map(|(_, e)| e).unwrap_or(DEFAULT_EXTENSION);
    if cleaned.is_empty() {
        format!("download.{ext}")
    } else {
        format!("{cleaned}.{ext}")
    }
}
