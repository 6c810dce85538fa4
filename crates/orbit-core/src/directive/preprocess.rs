//! Splits a submission into directives, shell escapes and residual code.

use super::tokenizer::split_directive;

/// Sigil starting a directive line.
pub const DIRECTIVE_SIGIL: char = '%';
/// Sigil starting a shell-escape line.
pub const SHELL_SIGIL: char = '!';
/// Marker after [`SHELL_SIGIL`] that runs the command in the scratch workspace.
pub const SCRATCH_MARKER: char = '*';
/// Directive consuming the following lines as a file body.
pub const WRITEFILE: &str = "writefile";

/// A control line extracted from a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `%name args...`
    Directive {
        /// 1-indexed submission line.
        line: usize,
        /// Directive name (`%` for `%%`).
        name: String,
        /// Tokenized arguments.
        args: Vec<String>,
    },
    /// `!command` or `!*command`.
    Shell {
        /// 1-indexed submission line.
        line: usize,
        /// Command text passed to the shell.
        command: String,
        /// Run in the scratch workspace instead of the working directory.
        in_scratch: bool,
    },
    /// `%writefile [-a] [name]` followed by its body lines.
    WriteFile {
        /// 1-indexed submission line.
        line: usize,
        /// Tokenized arguments.
        args: Vec<String>,
        /// Body text, one `\n` after each line.
        body: String,
    },
}

impl Command {
    /// Line the command starts on.
    pub fn line(&self) -> usize {
        match self {
            Command::Directive { line, .. }
            | Command::Shell { line, .. }
            | Command::WriteFile { line, .. } => *line,
        }
    }
}

/// Result of preprocessing a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    /// Commands, in submission order.
    pub commands: Vec<Command>,
    /// Residual code; consumed lines are blank so line numbers are preserved.
    pub code: String,
}

/// Whether a line starts a command. A lone sigil is an empty command.
fn is_command_line(line: &str) -> bool {
    line.starts_with(DIRECTIVE_SIGIL) || line.starts_with(SHELL_SIGIL)
}

/// Whether a line ends in an odd number of backslashes (a continuation marker).
fn continues(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}

/// Scan a submission and extract its commands.
pub fn preprocess<S: AsRef<str>>(lines: &[S]) -> Preprocessed {
    let lines: Vec<&str> = lines.iter().map(AsRef::as_ref).collect();
    let mut used = vec![false; lines.len()];
    let mut commands = Vec::new();

    let mut index = 0;
    while index < lines.len() {
        if !is_command_line(lines[index]) {
            index += 1;
            continue;
        }

        let start = index;
        let (joined, last) = join_continued(&lines, index, &mut used);
        index = last + 1;

        let sigil = joined.chars().next().unwrap_or(DIRECTIVE_SIGIL);
        let rest = joined[sigil.len_utf8()..].trim_start_matches(' ');
        if rest.is_empty() {
            continue;
        }

        if sigil == SHELL_SIGIL {
            let (command, in_scratch) = match rest.strip_prefix(SCRATCH_MARKER) {
                Some(command) => (command.to_string(), true),
                None => (rest.to_string(), false),
            };
            commands.push(Command::Shell {
                line: start + 1,
                command,
                in_scratch,
            });
            continue;
        }

        let mut parts = split_directive(rest);
        if parts.is_empty() {
            continue;
        }
        let name = parts.remove(0);
        if name == WRITEFILE {
            let mut body = String::new();
            while index < lines.len() && !is_command_line(lines[index]) {
                body.push_str(lines[index]);
                body.push('\n');
                used[index] = true;
                index += 1;
            }
            commands.push(Command::WriteFile {
                line: start + 1,
                args: parts,
                body,
            });
        } else {
            commands.push(Command::Directive {
                line: start + 1,
                name,
                args: parts,
            });
        }
    }

    let code = lines
        .iter()
        .zip(&used)
        .map(|(line, &used)| if used { "" } else { *line })
        .collect::<Vec<_>>()
        .join("\n");

    Preprocessed { commands, code }
}

/// Join `from` with following lines while they end in a continuation marker.
///
/// The marker is replaced by a single space. Returns the joined text and the
/// index of the last line consumed.
fn join_continued(lines: &[&str], from: usize, used: &mut [bool]) -> (String, usize) {
    let mut joined = String::new();
    let mut index = from;
    loop {
        joined.push_str(lines[index]);
        used[index] = true;
        if !continues(&joined) || index + 1 >= lines.len() {
            if continues(&joined) {
                joined.pop();
            }
            return (joined, index);
        }
        joined.pop();
        joined.push(' ');
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_and_residual_code() {
        let out = preprocess(&["%args -v \"a b\"", "let x = 1;", "!echo hi"]);
        assert_eq!(
            out.commands,
            vec![
                Command::Directive {
                    line: 1,
                    name: "args".into(),
                    args: vec!["-v".into(), "a b".into()],
                },
                Command::Shell {
                    line: 3,
                    command: "echo hi".into(),
                    in_scratch: false,
                },
            ]
        );
        assert_eq!(out.code, "\nlet x = 1;\n");
    }

    #[test]
    fn test_continuation_joins_with_single_space() {
        let out = preprocess(&["!echo a \\", "b \\", "c", "x();"]);
        assert_eq!(
            out.commands,
            vec![Command::Shell {
                line: 1,
                command: "echo a  b  c".into(),
                in_scratch: false,
            }]
        );
        assert_eq!(out.code.lines().count(), 4);
        assert_eq!(out.code.lines().nth(3), Some("x();"));
    }

    #[test]
    fn test_continuation_of_tokenized_directive() {
        let out = preprocess(&["%args --text \\", "\"hello world\""]);
        assert_eq!(
            out.commands,
            vec![Command::Directive {
                line: 1,
                name: "args".into(),
                args: vec!["--text".into(), "hello world".into()],
            }]
        );
    }

    #[test]
    fn test_escaped_backslash_does_not_continue() {
        let out = preprocess(&["!echo a\\\\", "let y = 2;"]);
        assert_eq!(out.commands.len(), 1);
        assert_eq!(out.code, "\nlet y = 2;");
    }

    #[test]
    fn test_scratch_shell_variant() {
        let out = preprocess(&["!*cargo add serde"]);
        assert_eq!(
            out.commands,
            vec![Command::Shell {
                line: 1,
                command: "cargo add serde".into(),
                in_scratch: true,
            }]
        );
    }

    #[test]
    fn test_double_percent_is_main_directive() {
        let out = preprocess(&["%% --flag"]);
        assert_eq!(
            out.commands,
            vec![Command::Directive {
                line: 1,
                name: "%".into(),
                args: vec!["--flag".into()],
            }]
        );
    }

    #[test]
    fn test_writefile_consumes_until_next_sigil() {
        let out = preprocess(&[
            "%writefile -a notes.txt",
            "first line",
            "  second",
            "%ls",
            "fn f() {}",
        ]);
        assert_eq!(
            out.commands,
            vec![
                Command::WriteFile {
                    line: 1,
                    args: vec!["-a".into(), "notes.txt".into()],
                    body: "first line\n  second\n".into(),
                },
                Command::Directive {
                    line: 4,
                    name: "ls".into(),
                    args: vec![],
                },
            ]
        );
        assert_eq!(out.code, "\n\n\n\nfn f() {}");
    }

    #[test]
    fn test_lone_sigil_is_consumed() {
        let out = preprocess(&["!", "x", "%"]);
        assert!(out.commands.is_empty());
        assert_eq!(out.code, "\nx\n");
    }

    #[test]
    fn test_lone_sigil_ends_writefile_body() {
        let out = preprocess(&["%writefile out.txt", "body", "%", "let y = 2;"]);
        assert_eq!(
            out.commands,
            vec![Command::WriteFile {
                line: 1,
                args: vec!["out.txt".into()],
                body: "body\n".into(),
            }]
        );
        assert_eq!(out.code, "\n\n\nlet y = 2;");
    }

    #[test]
    fn test_blank_command_is_consumed() {
        let out = preprocess(&["%   ", "x"]);
        assert!(out.commands.is_empty());
        assert_eq!(out.code, "\nx");
    }
}
