//! Tokenization of a single input line.
//!
//! The shell has no quoting or escaping: a token is any maximal run of
//! non-whitespace characters.

/// Split `line` into whitespace-delimited tokens.
pub fn split_into_tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}
