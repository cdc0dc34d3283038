//! Utilities shared by worker launchers and diagnostics.
//!
//! These helpers keep command-line rendering consistent between log output
//! and error messages for spawned workers.

/// Escapes a value for safe inclusion in a POSIX shell command.
///
/// Uses single-quote wrapping and the standard `'\''` sequence for embedded
/// quotes.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

/// Renders a command and its arguments as a copy-pasteable shell line.
///
/// Words made only of shell-safe characters are left bare.
#[must_use]
pub fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(|word| {
            if is_shell_safe(word) {
                word.to_owned()
            } else {
                shell_escape(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_shell_safe(word: &str) -> bool {
    !word.is_empty()
        && word.chars().all(|ch| {
            ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '=' | '+' | ',')
        })
}
