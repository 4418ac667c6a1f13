//! ANSI escape stripping for display.
//!
//! `TERM=dumb` keeps most tools quiet, but prompts and some flow scripts
//! still emit color codes. Stripping is a display policy of the app; the
//! bridge itself forwards bytes untouched.

/// Remove CSI (`ESC [ ... letter`) and OSC (`ESC ] ... BEL|ST`) sequences.
///
/// Other two-byte escapes (`ESC x`) are dropped together with their second
/// character.
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\x1b' {
            result.push(ch);
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // CSI ends at the first letter
                for next_ch in chars.by_ref() {
                    if next_ch.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                // OSC ends at BEL or ST (ESC \)
                while let Some(next_ch) = chars.next() {
                    if next_ch == '\x07' {
                        break;
                    }
                    if next_ch == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }

    result
}
