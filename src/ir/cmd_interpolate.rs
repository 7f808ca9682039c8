//! Command template handling for graph actions.
//!
//! Builder commands are stored in Ninja syntax, where `$` introduces a
//! variable. User-supplied templates use shell syntax, so their dollar signs
//! are escaped before they reach a rule, apart from the single placeholder
//! that is rebound to Ninja's `$in`.

use shell_quote::{QuoteRefExt, Sh};

use super::IrGenError;

/// Placeholder in programmer templates that receives the bitstream path.
pub const SOURCE_PLACEHOLDER: &str = "$SOURCE";

/// Returns `true` when the command contains an odd number of backticks.
///
/// # Examples
/// ```rust,ignore
/// assert!(has_unmatched_backticks("echo`"));
/// assert!(!has_unmatched_backticks("`echo`"));
/// ```
fn has_unmatched_backticks(s: &str) -> bool {
    s.chars().filter(|&c| c == '`').count().rem_euclid(2) != 0
}

/// Check that `command` splits into shell words.
///
/// # Errors
///
/// Returns [`IrGenError::InvalidCommand`] for unbalanced quotes or backticks.
pub fn validate_command(command: &str) -> Result<(), IrGenError> {
    if has_unmatched_backticks(command) || shlex::split(command).is_none() {
        let snippet = command.chars().take(160).collect();
        return Err(IrGenError::InvalidCommand {
            command: command.to_owned(),
            snippet,
        });
    }
    Ok(())
}

/// Quote `arg` as a single POSIX shell word and escape it for Ninja.
#[must_use]
pub fn quote_arg(arg: &str) -> String {
    let bytes: Vec<u8> = arg.quoted(Sh);
    let quoted = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug_assert!(false, "shell quoting produced non UTF-8 bytes: {err}");
            String::from_utf8_lossy(&err.into_bytes()).into_owned()
        }
    };
    escape_dollars(&quoted)
}

/// Double every `$` so Ninja passes it through literally.
#[must_use]
pub fn escape_dollars(text: &str) -> String {
    text.replace('$', "$$")
}

/// Rewrite a user command template into a Ninja command.
///
/// Each [`SOURCE_PLACEHOLDER`] outside backticks becomes `$in`. Every other
/// dollar sign is escaped.
///
/// # Errors
///
/// Returns [`IrGenError::MissingPlaceholder`] if the template never uses the
/// placeholder and [`IrGenError::InvalidCommand`] if the result is not valid
/// shell syntax.
pub fn bind_source(template: &str) -> Result<String, IrGenError> {
    let (command, found) = substitute(template, &placeholder_chars());
    if !found {
        return Err(IrGenError::MissingPlaceholder {
            placeholder: SOURCE_PLACEHOLDER.to_owned(),
            command: template.to_owned(),
        });
    }
    validate_command(&command)?;
    Ok(command)
}

fn placeholder_chars() -> Vec<char> {
    SOURCE_PLACEHOLDER.chars().skip(1).collect()
}

/// Returns whether `ch` is a valid identifier character (ASCII letter, digit, or underscore).
///
/// # Examples
/// ```rust,ignore
/// assert!(is_identifier_char('a'));
/// assert!(!is_identifier_char('-'));
/// ```
fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Checks if `pattern` matches `chars` starting at `pos`.
fn matches_pattern_at_position(chars: &[char], pos: usize, pattern: &[char]) -> bool {
    pattern
        .iter()
        .enumerate()
        .all(|(off, ch)| matches!(chars.get(pos + off), Some(c) if c == ch))
}

/// Ensures characters around the token are not identifier characters.
///
/// # Examples
/// ```rust,ignore
/// let chars: Vec<char> = "$SOURCE".chars().collect();
/// assert!(has_valid_word_boundaries(&chars, 0, 6));
/// let chars: Vec<char> = "$SOURCES".chars().collect();
/// assert!(!has_valid_word_boundaries(&chars, 0, 6));
/// ```
fn has_valid_word_boundaries(chars: &[char], pos: usize, len: usize) -> bool {
    let prev_ok = chars
        .get(pos.wrapping_sub(1))
        .is_none_or(|c| !is_identifier_char(*c));
    let next_ok = chars
        .get(pos + len + 1)
        .is_none_or(|c| !is_identifier_char(*c));
    prev_ok && next_ok
}

/// Returns the skip length when `$pattern` matches at `pos`.
fn try_match_placeholder(chars: &[char], pos: usize, pattern: &[char]) -> Option<usize> {
    if matches_pattern_at_position(chars, pos + 1, pattern)
        && has_valid_word_boundaries(chars, pos, pattern.len())
    {
        Some(pattern.len() + 1)
    } else {
        None
    }
}

fn substitute(template: &str, pattern: &[char]) -> (String, bool) {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len() + 8);
    let mut in_backticks = false;
    let mut found = false;
    let mut i = 0;
    while let Some(&ch) = chars.get(i) {
        if ch == '`' {
            in_backticks ^= true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch != '$' {
            out.push(ch);
            i += 1;
            continue;
        }

        match try_match_placeholder(&chars, i, pattern) {
            Some(skip) if !in_backticks => {
                out.push_str("$in");
                found = true;
                i += skip;
            }
            _ => {
                out.push_str("$$");
                i += 1;
            }
        }
    }
    (out, found)
}
