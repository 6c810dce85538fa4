//! Tokenizer for directive lines.
//!
//! Splits on unquoted whitespace. Double quotes group words (and allow an
//! empty argument); inside quotes `\n` and `\t` are newline and tab, and a
//! backslash before any other char yields that char. Outside quotes a
//! backslash is an ordinary character.

/// Tokenizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between or inside unquoted words.
    Normal,
    /// Inside a double-quoted section.
    InQuotes,
    /// Right after a backslash inside quotes.
    Escaped,
}

/// Split a directive line into its parts.
///
/// `%args --text "hello world"` yields `["%args", "--text", "hello world"]`.
pub fn split_directive(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut part = String::new();
    let mut started = false;
    let mut state = State::Normal;

    for c in line.chars() {
        state = match (state, c) {
            (State::Normal, ' ' | '\t' | '\n') => {
                if started {
                    parts.push(std::mem::take(&mut part));
                    started = false;
                }
                State::Normal
            }
            (State::Normal, '"') => {
                started = true;
                State::InQuotes
            }
            (State::Normal, c) => {
                part.push(c);
                started = true;
                State::Normal
            }
            (State::InQuotes, '"') => State::Normal,
            (State::InQuotes, '\\') => State::Escaped,
            (State::InQuotes, c) => {
                part.push(c);
                State::InQuotes
            }
            (State::Escaped, c) => {
                part.push(match c {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                State::InQuotes
            }
        };
    }

    if started {
        parts.push(part);
    }
    parts
}
