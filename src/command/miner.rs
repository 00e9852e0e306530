//! Extraction of command lines from free-form generator output.
//!
//! Generators wrap commands in prose, markdown, numbered lists, and inline
//! code spans. [`mine`] walks the reply line by line and keeps only text
//! whose first word is one of [`VERBS`]. Order is preserved and nothing is
//! de-duplicated: a repeated line is kept only because the generator
//! repeated it.

/// Command verbs the miner accepts.
pub const VERBS: [&str; 4] = ["add", "connect", "wire", "place"];

/// Returns `true` if the first whitespace-delimited word of `text` is a verb.
#[must_use]
pub fn starts_with_verb(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .is_some_and(|word| VERBS.iter().any(|verb| word.eq_ignore_ascii_case(verb)))
}

/// Extracts candidate command strings from a generator reply.
#[must_use]
pub fn mine(text: &str) -> Vec<String> {
    text.lines().filter_map(mine_line).collect()
}

fn mine_line(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') || is_bold_header(trimmed) {
        return None;
    }

    if let Some(span) = first_code_span(trimmed) {
        if starts_with_verb(span) {
            return Some(span.to_string());
        }
    }

    if let Some(pos) = find_ascii_case_insensitive(trimmed, "command:") {
        if let Some(span) = first_code_span(&trimmed[pos + "command:".len()..]) {
            if starts_with_verb(span) {
                return Some(span.to_string());
            }
        }
    }

    if let Some(rest) = strip_list_marker(trimmed) {
        let rest = strip_emphasis(rest);
        return starts_with_verb(rest).then(|| rest.to_string());
    }

    let bare = strip_emphasis(trimmed);
    starts_with_verb(bare).then(|| bare.to_string())
}

/// `**Some heading:**` or `**Some heading**:`
fn is_bold_header(line: &str) -> bool {
    line.starts_with("**") && (line.ends_with(":**") || line.ends_with("**:"))
}

/// Contents of the first `` `…` `` span, trimmed.
fn first_code_span(text: &str) -> Option<&str> {
    let open = text.find('`')?;
    let rest = &text[open + 1..];
    let close = rest.find('`')?;
    let span = rest[..close].trim();
    (!span.is_empty()).then_some(span)
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Strips `1.`, `12)`, `-`, `*` or `+` list markers.
fn strip_list_marker(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        return rest
            .strip_prefix('.')
            .or_else(|| rest.strip_prefix(')'))
            .map(str::trim_start);
    }

    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim_start());
        }
    }
    None
}

/// Removes a `**…**` or `__…__` wrapper around the whole text.
fn strip_emphasis(text: &str) -> &str {
    for marker in ["**", "__"] {
        if let Some(inner) = text
            .strip_prefix(marker)
            .and_then(|t| t.strip_suffix(marker))
        {
            return inner.trim();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_spans_are_preferred() {
        let text = "First, place the resistor: `add component Device:R at 0,0` here.";
        assert_eq!(mine(text), ["add component Device:R at 0,0"]);
    }

    #[test]
    fn code_span_without_verb_falls_through() {
        let text = "Use `Device:R` for this.";
        assert!(mine(text).is_empty());
    }

    #[test]
    fn command_prefix_with_code_span() {
        let text = "Step 2 - Command: `connect U1.VIN to C1.1`";
        assert_eq!(mine(text), ["connect U1.VIN to C1.1"]);
    }

    #[test]
    fn numbered_lists() {
        let text = "1. add component Device:R\n2) connect R1.1 to R2.1\n10. wire R2.2 to R3.1\n3. Then check the result";
        assert_eq!(
            mine(text),
            [
                "add component Device:R",
                "connect R1.1 to R2.1",
                "wire R2.2 to R3.1"
            ]
        );
    }

    #[test]
    fn bullets_and_bold() {
        let text = "- add component Device:C\n* **connect C1.1 to R1.2**";
        assert_eq!(mine(text), ["add component Device:C", "connect C1.1 to R1.2"]);
    }

    #[test]
    fn headers_and_blank_lines_are_skipped() {
        let text = "# Add components\n\n**Add Ground Symbol:**\n**Wire things**:\nadd component power:GND";
        assert_eq!(mine(text), ["add component power:GND"]);
    }

    #[test]
    fn bare_lines_need_a_verb_word() {
        let text = "Additionally, you may want a capacitor.\nplace Device:C at 10,10\naddress the issue";
        assert_eq!(mine(text), ["place Device:C at 10,10"]);
    }

    #[test]
    fn repeats_are_kept() {
        let text = "add component Device:R\nadd component Device:R";
        assert_eq!(mine(text).len(), 2);
    }

    #[test]
    fn verb_check_ignores_case() {
        assert!(starts_with_verb("CONNECT U1.1 to U2.1"));
        assert!(!starts_with_verb("connector J1"));
        assert!(!starts_with_verb(""));
    }
}
