//! RFC 5322 address-list parsing (spec.md §4.6): mailbox / group
//! syntax, flattened per spec.md's rule that group membership
//! (including the empty `undisclosed-recipients:;` case) folds into
//! the caller's address list with no error.

use nom::{
    branch::alt,
    bytes::complete::is_not,
    character::complete::char,
    combinator::{map, recognize},
    multi::many0,
    sequence::{delimited, pair},
    IResult,
};

use crate::address::{Address, AddressListItem};
use crate::parse::encoded_word;

/// Parses a full address-list field value (the text after the colon)
/// into flattened [`AddressListItem`]s. Never fails outright: a
/// token that cannot be parsed as mailbox or group is skipped, mirroring
/// the original's lenient posture (spec.md §4.6's "undisclosed
/// recipients" carve-out generalised to any unparsable token).
pub fn parse_address_list(input: &str) -> Vec<AddressListItem> {
    split_top_level(input)
        .into_iter()
        .filter(|tok| !tok.is_empty())
        .filter_map(|tok| parse_one(&tok))
        .collect()
}

fn parse_one(token: &str) -> Option<AddressListItem> {
    if let Some(colon) = find_top_level_colon(token) {
        let name = encoded_word::decode(token[..colon].trim());
        let rest = token[colon + 1..].trim();
        let rest = rest.strip_suffix(';').unwrap_or(rest);
        let members = split_top_level(rest)
            .into_iter()
            .filter(|t| !t.is_empty())
            .filter_map(|t| parse_mailbox(&t))
            .collect();
        Some(AddressListItem::Group { name, members })
    } else {
        parse_mailbox(token).map(AddressListItem::Mailbox)
    }
}

fn parse_mailbox(token: &str) -> Option<Address> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if let Some(open) = find_unquoted(token, '<') {
        let close = token.rfind('>')?;
        if close < open {
            return None;
        }
        let display_name = decode_display_name(token[..open].trim());
        let spec = token[open + 1..close].trim();
        let (local, domain) = split_addr_spec(spec)?;
        Some(Address::new(display_name, local.into_bytes(), domain))
    } else {
        let (local, domain) = split_addr_spec(token)?;
        Some(Address::new(String::new(), local.into_bytes(), domain))
    }
}

fn decode_display_name(raw: &str) -> String {
    let unquoted = strip_quotes(raw);
    encoded_word::decode(&unquoted)
}

fn strip_quotes(raw: &str) -> String {
    if let Ok((_, s)) = quoted_string(raw) {
        s
    } else {
        raw.to_string()
    }
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

/// Splits `local-part@domain`, tolerating a quoted local-part. Domain
/// is lowercased for comparison elsewhere but stored as given here,
/// callers (e.g. `Address::dedup_key`) do the lowercasing.
fn split_addr_spec(spec: &str) -> Option<(String, String)> {
    let at = find_unquoted(spec, '@')?;
    let local = strip_quotes(spec[..at].trim());
    let domain = spec[at + 1..].trim().trim_end_matches('.').to_string();
    Some((local, domain))
}

/// Finds the first unquoted, unescaped occurrence of `needle` at
/// paren/bracket depth zero.
fn find_unquoted(input: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut depth = 0i32;
    let mut chars = input.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if in_quotes => {
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth -= 1,
            c if c == needle && !in_quotes && depth <= 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn find_top_level_colon(input: &str) -> Option<usize> {
    find_unquoted(input, ':')
}

/// Splits a comma-separated address-list into top-level tokens,
/// treating `group-name: member, member;` as one token (internal
/// commas belong to the group) and respecting quoted strings and
/// angle-addr/comment nesting.
fn split_top_level(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut in_group = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                if let Some(n) = chars.next() {
                    current.push(n);
                }
            }
            '(' | '<' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ')' | '>' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            ':' if !in_quotes && depth == 0 => {
                in_group = true;
                current.push(c);
            }
            ';' if !in_quotes && depth == 0 && in_group => {
                in_group = false;
                current.push(c);
                tokens.push(std::mem::take(&mut current).trim().to_string());
            }
            ',' if !in_quotes && depth == 0 && !in_group => {
                tokens.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_mailbox() {
        let items = parse_address_list("alice@example.com");
        assert_eq!(items.len(), 1);
        match &items[0] {
            AddressListItem::Mailbox(a) => {
                assert_eq!(a.localpart, b"alice");
                assert_eq!(a.domain, "example.com");
                assert_eq!(a.display_name, "");
            }
            _ => panic!("expected mailbox"),
        }
    }

    #[test]
    fn parses_name_addr_with_quoted_display_name() {
        let items = parse_address_list(r#""Alice Example" <alice@example.com>"#);
        match &items[0] {
            AddressListItem::Mailbox(a) => {
                assert_eq!(a.display_name, "Alice Example");
                assert_eq!(a.localpart, b"alice");
            }
            _ => panic!("expected mailbox"),
        }
    }

    #[test]
    fn parses_multiple_mailboxes() {
        let items = parse_address_list("alice@example.com, bob@example.com");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn parses_empty_group_as_no_addresses() {
        let items = parse_address_list("undisclosed-recipients:;");
        assert_eq!(items.len(), 1);
        match &items[0] {
            AddressListItem::Group { members, .. } => assert!(members.is_empty()),
            _ => panic!("expected group"),
        }
        assert!(crate::address::flatten(&items).is_empty());
    }

    #[test]
    fn parses_group_with_members() {
        let items = parse_address_list("Team: alice@example.com, bob@example.com;");
        let flattened = crate::address::flatten(&items);
        assert_eq!(flattened.len(), 2);
    }

    #[test]
    fn decodes_encoded_word_display_name() {
        let items = parse_address_list("=?UTF-8?Q?Alice?= <alice@example.com>");
        match &items[0] {
            AddressListItem::Mailbox(a) => assert_eq!(a.display_name, "Alice"),
            _ => panic!("expected mailbox"),
        }
    }
}
