//! Content-Type / Content-Disposition parameter-list parsing, including
//! RFC 2231 extended-parameter decoding (spec.md §4.6: "parameters are
//! case-insensitive keyed, values are RFC 2231-decoded").

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};

use crate::content_type::ContentType;

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(is_token_char)(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            recognize(many0(alt((
                recognize(pair(char('\\'), nom::character::complete::anychar)),
                is_not("\"\\"),
            )))),
            char('"'),
        ),
        |inner: &str| inner.replace("\\\"", "\"").replace("\\\\", "\\"),
    )(input)
}

fn param_value(input: &str) -> IResult<&str, String> {
    alt((quoted_string, map(token, |t: &str| t.to_string())))(input)
}

fn one_param(input: &str) -> IResult<&str, (String, String)> {
    map(
        separated_pair(
            preceded(multispace0, token),
            delimited(multispace0, char('='), multispace0),
            param_value,
        ),
        |(name, value)| (name.to_string(), value),
    )(input)
}

/// Parses `type/subtype; name=value; ...` into a [`ContentType`].
/// Lenient: a malformed parameter is skipped rather than failing the
/// whole field, matching the original's tolerant MIME posture.
pub fn parse_content_type(input: &str) -> Option<ContentType> {
    let input = input.trim();
    let slash = input.find('/')?;
    let media_type_end = input[..slash]
        .char_indices()
        .find(|(_, c)| *c == ';' || c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(slash);
    let media_type = input[..media_type_end].trim().to_string();
    if media_type.is_empty() {
        return None;
    }
    let rest = &input[slash + 1..];
    let (subtype, params_str) = match rest.find(';') {
        Some(i) => (rest[..i].trim(), &rest[i + 1..]),
        None => (rest.trim(), ""),
    };
    let mut ct = ContentType::new(media_type, subtype.to_string());
    for raw_param in split_params(params_str) {
        if raw_param.trim().is_empty() {
            continue;
        }
        if let Ok((_, (name, value))) = one_param(raw_param.trim()) {
            ct.set_param(name, value);
        }
    }
    decode_rfc2231_continuations(&mut ct);
    Some(ct)
}

/// Splits a parameter list on top-level semicolons, respecting quoted
/// strings (a `;` inside a quoted value does not end the parameter).
fn split_params(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_quotes = !in_quotes,
            b'\\' if in_quotes => i += 1,
            b';' if !in_quotes => {
                out.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    out.push(&input[start..]);
    out
}

/// RFC 2231 splits long/charset-bearing parameter values across
/// `name*0`, `name*1`, ... keys (optionally `name*0*=charset''value`
/// for the first segment). This collapses any such segments already
/// collected under their literal `name*N` keys back into one `name`
/// parameter with percent-decoding and charset conversion applied.
fn decode_rfc2231_continuations(ct: &mut ContentType) {
    let extended: Vec<(String, String)> = ct
        .params()
        .filter(|(k, _)| k.contains('*'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if extended.is_empty() {
        return;
    }
    for (key, _) in &extended {
        ct.remove_param(key);
    }
    let mut groups: BTreeMap<String, Vec<(u32, String)>> = BTreeMap::new();
    for (key, value) in &extended {
        let mut parts = key.splitn(2, '*');
        let base = parts.next().unwrap_or("").to_string();
        let suffix = parts.next().unwrap_or("");
        let index: u32 = suffix.trim_end_matches('*').parse().unwrap_or(0);
        groups.entry(base).or_default().push((index, value.clone()));
    }
    for (base, mut segments) in groups {
        segments.sort_by_key(|(i, _)| *i);
        let mut charset = None;
        let mut decoded = String::new();
        for (i, (_, raw)) in segments.iter().enumerate() {
            let mut value = raw.clone();
            if i == 0 {
                if let Some((cs, rest)) = split_extended_first_segment(raw) {
                    charset = Some(cs);
                    value = rest;
                }
            }
            decoded.push_str(&percent_decode(&value));
        }
        let final_value = match charset {
            Some(cs) => decode_bytes_with_charset(&decoded, &cs),
            None => decoded,
        };
        ct.set_param(base, final_value);
    }
}

fn split_extended_first_segment(raw: &str) -> Option<(String, String)> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?.to_string();
    let _language = parts.next()?;
    let value = parts.next()?.to_string();
    if charset.is_empty() {
        None
    } else {
        Some((charset, value))
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn decode_bytes_with_charset(percent_decoded: &str, charset: &str) -> String {
    // percent_decode already turned escapes into the final UTF-8-lossy
    // text; re-encode to bytes and reinterpret if a non-UTF-8 charset
    // was declared, matching the module's encoded_word handling.
    if charset.eq_ignore_ascii_case("utf-8") {
        return percent_decoded.to_string();
    }
    let bytes = percent_decoded.as_bytes();
    let encoding =
        encoding_rs::Encoding::for_label(charset.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_type() {
        let ct = parse_content_type("text/plain").unwrap();
        assert_eq!(ct.media_type, "text");
        assert_eq!(ct.subtype, "plain");
    }

    #[test]
    fn parses_quoted_boundary_param() {
        let ct = parse_content_type(r#"multipart/mixed; boundary="abc 123""#).unwrap();
        assert_eq!(ct.boundary(), Some("abc 123"));
    }

    #[test]
    fn parses_unquoted_charset_param() {
        let ct = parse_content_type("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn rejects_missing_slash() {
        assert!(parse_content_type("not-a-type").is_none());
    }

    #[test]
    fn param_with_semicolon_inside_quotes_is_preserved() {
        let ct = parse_content_type(r#"text/plain; name="a;b""#).unwrap();
        assert_eq!(ct.param("name"), Some("a;b"));
    }
}
