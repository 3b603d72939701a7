//! Keypad glyph substitution and the checks that run before tokenizing.

use crate::error::CalcError;

/// Longest normalized expression accepted, in characters.
pub const MAX_LENGTH: usize = 1000;

/// Shortest substring considered by the repetition guard.
const MIN_REPEAT_LEN: usize = 10;

/// Number of back-to-back copies of one substring that trips the guard.
const MAX_REPEATS: usize = 4;

/// Returns true when the input is nothing but digits and decimal points,
/// which is not a calculation.
pub fn is_bare_number(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Replaces the display glyphs of the keypad with the ASCII spelling the
/// tokenizer understands.
pub fn substitute_glyphs(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '×' => out.push('*'),
            '÷' => out.push('/'),
            '−' => out.push('-'),
            'π' => out.push_str("pi"),
            '√' => out.push_str("sqrt"),
            _ => out.push(c),
        }
    }
    out
}

/// Rejects expressions that are too long, or that contain a run of
/// [`MAX_REPEATS`] copies of some substring of at least
/// [`MIN_REPEAT_LEN`] characters.
pub fn check_complexity(normalized: &str) -> Result<(), CalcError> {
    if normalized.chars().count() > MAX_LENGTH || has_repeated_run(normalized.as_bytes()) {
        Err(CalcError::TooComplex)
    } else {
        Ok(())
    }
}

/// Fails when the expression closes more parentheses than it opens.
/// Missing closing parentheses are added later, excess ones never removed.
pub fn check_closing_parens(normalized: &str) -> Result<(), CalcError> {
    let opening = normalized.matches('(').count();
    let closing = normalized.matches(')').count();
    if closing > opening {
        Err(CalcError::UnmatchedParenthesis)
    } else {
        Ok(())
    }
}

// A window of `MAX_REPEATS * p` bytes is `MAX_REPEATS` copies of its first
// `p` bytes exactly when `b[i] == b[i + p]` holds for the first
// `(MAX_REPEATS - 1) * p` positions of the window.
fn has_repeated_run(bytes: &[u8]) -> bool {
    let n = bytes.len();
    for period in MIN_REPEAT_LEN..=n / MAX_REPEATS {
        let needed = period * (MAX_REPEATS - 1);
        let mut run = 0;
        for i in 0..n - period {
            if bytes[i] == bytes[i + period] {
                run += 1;
                if run >= needed {
                    return true;
                }
            } else {
                run = 0;
            }
        }
    }
    false
}
