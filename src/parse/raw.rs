//! Splits a raw RFC 5322 message into header lines and body bytes,
//! unfolding obsolete CFWS continuation lines (spec.md §4.6: "a header
//! line is `NAME ":" SP? VALUE (CRLF (SP|HT) cont)* CRLF`. Stop at the
//! first blank line.").

/// One raw header field before classification: the verbatim name and
/// its unfolded value text (continuation lines joined with a single
/// space, leading/trailing whitespace trimmed per field-value
/// convention (the original folding whitespace is not semantically
/// significant once unfolded).
pub struct RawField<'a> {
    pub name: &'a str,
    pub value: String,
}

/// Splits `input` into its header fields and trailing body bytes. A
/// line is part of the header until the first entirely blank line
/// (`CRLF` or bare `LF` immediately following a line terminator); any
/// input with no blank line is treated as all-header, empty-body
/// (lenient, matching the original's `Stop at the first blank line`).
pub fn split_message(input: &[u8]) -> (Vec<RawField<'_>>, &[u8]) {
    let lines = split_lines(input);
    let mut fields = Vec::new();
    let mut body_start = input.len();
    let mut i = 0;
    while i < lines.len() {
        let (line, line_end) = lines[i];
        if line.is_empty() {
            body_start = line_end;
            break;
        }
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let name = std::str::from_utf8(&line[..colon]).unwrap_or("").trim();
            let mut value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_string();
            // Consume continuation lines: any subsequent line starting
            // with SP or HT folds into this field's value.
            let mut j = i + 1;
            while j < lines.len() {
                let (cont, _) = lines[j];
                if cont.first() == Some(&b' ') || cont.first() == Some(&b'\t') {
                    value.push(' ');
                    value.push_str(String::from_utf8_lossy(cont).trim());
                    j += 1;
                } else {
                    break;
                }
            }
            fields.push(RawField { name, value });
            i = j;
        } else {
            // Malformed line with no colon; per spec.md's lenient
            // posture this does not abort parsing, skip it, the
            // caller's validation surfaces the overall message error.
            i += 1;
        }
    }
    if body_start == input.len() && i >= lines.len() {
        body_start = input.len();
    }
    (fields, &input[body_start..])
}

/// Splits `input` into `(line_bytes, offset_past_terminator)` pairs,
/// recognising both CRLF and bare LF line endings.
fn split_lines(input: &[u8]) -> Vec<(&[u8], usize)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'\n' {
            let line_end = if i > start && input[i - 1] == b'\r' {
                i - 1
            } else {
                i
            };
            out.push((&input[start..line_end], i + 1));
            start = i + 1;
        }
        i += 1;
    }
    if start < input.len() {
        out.push((&input[start..], input.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_header_and_body() {
        let msg = b"Subject: hi\r\nFrom: a@b.com\r\n\r\nbody text";
        let (fields, body) = split_message(msg);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "Subject");
        assert_eq!(fields[0].value, "hi");
        assert_eq!(body, b"body text");
    }

    #[test]
    fn unfolds_continuation_lines() {
        let msg = b"Subject: hello\r\n  world\r\n\r\n";
        let (fields, _) = split_message(msg);
        assert_eq!(fields[0].value, "hello world");
    }

    #[test]
    fn handles_bare_lf() {
        let msg = b"Subject: hi\nFrom: a@b.com\n\nbody";
        let (fields, body) = split_message(msg);
        assert_eq!(fields.len(), 2);
        assert_eq!(body, b"body");
    }

    #[test]
    fn no_blank_line_is_all_header() {
        let msg = b"Subject: hi\r\n";
        let (fields, body) = split_message(msg);
        assert_eq!(fields.len(), 1);
        assert!(body.is_empty());
    }
}
