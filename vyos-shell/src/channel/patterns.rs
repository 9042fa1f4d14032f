//! Pattern helpers for prompt detection and output cleanup.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a regex.
///
/// Anchors to the end of the output unless the pattern is already anchored,
/// so a prompt character appearing mid-output does not end a command early.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') && !pattern.ends_with("\\$") {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

/// Build one regex matching any of the given prompt patterns.
pub fn combine_patterns<'a>(
    patterns: impl IntoIterator<Item = &'a Regex>,
) -> Result<Regex, regex::Error> {
    let combined = patterns
        .into_iter()
        .map(|p| format!("(?:{})", p.as_str()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&combined)
}

/// Strip the command echo, `[edit]` context lines and the trailing prompt.
pub fn normalize_output(raw: &str, command: &str) -> String {
    let raw = raw.replace("\r\n", "\n").replace('\r', "");

    let output = raw
        .trim_start_matches('\n')
        .strip_prefix(command)
        .unwrap_or(&raw)
        .trim_start_matches('\n');

    // Last line is the prompt
    let body = match output.rfind('\n') {
        Some(pos) => &output[..pos],
        None => "",
    };

    body.lines()
        .filter(|line| !line.trim().starts_with("[edit"))
        .collect::<Vec<_>>()
        .join("\n")
}
