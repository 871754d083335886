/// Normalizes raw extractor output for downstream parsing: collapses runs of
/// internal whitespace, trims line edges, and drops empty lines. Statement
/// parsing is line-oriented, so layout artifacts (column padding, trailing
/// form-feed noise) would otherwise leak into descriptions.
pub fn sanitize_extracted_text(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !result.is_empty() {
            result.push('\n');
        }
        collapse_internal_whitespace(trimmed, &mut result);
    }

    result
}

fn collapse_internal_whitespace(line: &str, out: &mut String) {
    let mut prev_was_space = false;

    for ch in line.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                out.push(' ');
                prev_was_space = true;
            }
        } else {
            out.push(ch);
            prev_was_space = false;
        }
    }
}
