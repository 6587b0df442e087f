//! Top-level recursive MIME parser: turns raw bytes into a
//! [`crate::message::Message`] tree (spec.md §4.6).

use crate::bodypart::{Bodypart, Content, Encoding};
use crate::config::MessageConfig;
use crate::content_type::ContentType;
use crate::error::MessageError;
use crate::header::{FieldType, FieldValue, Header};
use crate::message::Message;
use crate::parse::{address, content_type as parse_content_type, date, raw};

/// Parses a full RFC 5322 message, falling back to
/// [`Message::wrap_unparsable_message`] on any structural error so a
/// caller always gets a `Message` back (spec.md §4.6's lenient
/// posture: a malformed message is stored, not rejected).
pub fn parse_message_lenient(input: &[u8], config: &MessageConfig, internal_date: i64) -> Message {
    match parse_message(input, config, internal_date) {
        Ok(message) => message,
        Err(err) => Message::wrap_unparsable_message(input.to_vec(), err, "[unparsable message]", internal_date),
    }
}

/// Parses a full RFC 5322 message, returning an error rather than
/// wrapping it (used by the injector when the host wants to reject
/// outright instead of spooling the original as an opaque blob).
pub fn parse_message(input: &[u8], config: &MessageConfig, internal_date: i64) -> Result<Message, MessageError> {
    let (header, root) = parse_header_and_body(input, config, 0)?;
    Ok(Message::new(header, root, input.len() as u64, internal_date))
}

/// Parses the top-level header plus its body into a `(Header, Bodypart)`
/// pair; `depth` tracks multipart/message-rfc822 nesting against
/// `config.max_nesting_depth`.
fn parse_header_and_body(
    input: &[u8],
    config: &MessageConfig,
    depth: usize,
) -> Result<(Header, Bodypart), MessageError> {
    if depth > config.max_nesting_depth {
        return Err(MessageError::unterminated_multipart());
    }
    let (raw_fields, body) = raw::split_message(input);
    if raw_fields.is_empty() && body.is_empty() && !input.is_empty() {
        return Err(MessageError::no_header_boundary());
    }
    let mut header = Header::new();
    for field in &raw_fields {
        push_parsed_field(&mut header, field.name, &field.value, config)?;
    }
    let root = parse_body(&header, body, config, depth)?;
    Ok((header, root))
}

fn push_parsed_field(
    header: &mut Header,
    name: &str,
    value: &str,
    config: &MessageConfig,
) -> Result<(), MessageError> {
    let field_type = FieldType::classify(name);
    let parsed = if field_type.is_address_field() {
        let items = address::parse_address_list(value);
        FieldValue::Addresses(crate::address::flatten(&items))
    } else {
        match field_type {
            FieldType::Date | FieldType::ResentDate => match date::parse_date(value) {
                Ok(dt) => FieldValue::Date(dt),
                // A malformed Date is not fatal to the whole message;
                // keep the raw text, matching the lenient posture used
                // for unrecognised address tokens.
                Err(_) => FieldValue::Text(value.to_string()),
            },
            FieldType::ContentType => match parse_content_type::parse_content_type(value) {
                Some(ct) => FieldValue::ContentType(ct),
                None => FieldValue::ContentType(fallback_content_type(config)),
            },
            FieldType::Subject | FieldType::Comments => FieldValue::Text(crate::parse::encoded_word::decode(value)),
            _ => FieldValue::Text(value.to_string()),
        }
    };
    header.push(name.to_string(), field_type, value.to_string(), parsed);
    Ok(())
}

fn fallback_content_type(_config: &MessageConfig) -> ContentType {
    ContentType::text_plain()
}

fn parse_body(
    header: &Header,
    body: &[u8],
    config: &MessageConfig,
    depth: usize,
) -> Result<Bodypart, MessageError> {
    let content_type = header.content_type().cloned().unwrap_or_else(ContentType::text_plain);
    let encoding = header
        .content_transfer_encoding()
        .map(Encoding::from_header_value)
        .unwrap_or(Encoding::Binary);

    if content_type.is_multipart() {
        let boundary = content_type.boundary().ok_or_else(MessageError::missing_boundary)?;
        let children = split_multipart(body, boundary)?
            .into_iter()
            .enumerate()
            .map(|(i, part_bytes)| {
                let default_child_type = if content_type.is_digest() {
                    "message/rfc822"
                } else {
                    "text/plain"
                };
                parse_multipart_child(part_bytes, default_child_type, config, depth + 1, i as u32 + 1)
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Bodypart::new_multipart(1, Header::new(), children));
    }

    if content_type.is_message_rfc822() {
        let decoded = decode_body(body, encoding)?;
        let (inner_header, inner_root) = parse_header_and_body(&decoded, config, depth + 1)?;
        let inner = Message::new(inner_header, inner_root, decoded.len() as u64, 0);
        return Ok(Bodypart::new_message(1, Header::new(), inner, body.len() as u64));
    }

    let decoded = decode_body(body, encoding)?;
    if content_type.is_text() {
        let charset = content_type.charset().unwrap_or(config.fallback_charset);
        let text = decode_charset(&decoded, charset);
        Ok(Bodypart::new_text(1, Header::new(), text, encoding))
    } else {
        Ok(Bodypart::new_binary(1, Header::new(), decoded, encoding))
    }
}

/// Parses one multipart child: its own header/body pair, defaulting an
/// absent Content-Type to `default_child_type` per spec.md §4.6 (plain
/// for most multipart subtypes, `message/rfc822` for `multipart/digest`).
fn parse_multipart_child(
    part_bytes: &[u8],
    default_child_type: &str,
    config: &MessageConfig,
    depth: usize,
    number: u32,
) -> Result<Bodypart, MessageError> {
    let (raw_fields, body) = raw::split_message(part_bytes);
    let mut header = Header::new();
    for field in &raw_fields {
        push_parsed_field(&mut header, field.name, &field.value, config)?;
    }
    if header.content_type().is_none() {
        if let Some(ct) = parse_content_type::parse_content_type(default_child_type) {
            header.push(
                "Content-Type".to_string(),
                FieldType::ContentType,
                default_child_type.to_string(),
                FieldValue::ContentType(ct),
            );
        }
    }
    let mut bodypart = parse_body(&header, body, config, depth)?;
    bodypart.header = header;
    bodypart.number = number;
    Ok(bodypart)
}

/// Splits a multipart body on `--boundary` delimiter lines, discarding
/// the preamble before the first delimiter and the epilogue after the
/// closing `--boundary--` (spec.md §4.6).
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>, MessageError> {
    let delimiter = format!("--{}", boundary);
    let delimiter_bytes = delimiter.as_bytes();

    // Find the first delimiter; anything before it is preamble and is
    // dropped (spec.md §4.6).
    let first = find_subslice(body, delimiter_bytes).ok_or_else(MessageError::unterminated_multipart)?;
    let mut cursor = skip_delimiter_eol(body, first + delimiter_bytes.len());

    let mut parts = Vec::new();
    loop {
        match find_subslice(&body[cursor..], delimiter_bytes) {
            Some(rel) => {
                let pos = cursor + rel;
                parts.push(trim_trailing_crlf(&body[cursor..pos]));
                let after_delim = pos + delimiter_bytes.len();
                if body[after_delim..].starts_with(b"--") {
                    return Ok(parts);
                }
                cursor = skip_delimiter_eol(body, after_delim);
            }
            None => return Err(MessageError::unterminated_multipart()),
        }
    }
}

fn skip_delimiter_eol(body: &[u8], mut pos: usize) -> usize {
    if body.get(pos) == Some(&b'\r') {
        pos += 1;
    }
    if body.get(pos) == Some(&b'\n') {
        pos += 1;
    }
    pos
}

fn trim_trailing_crlf(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }
    &data[..end]
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_body(body: &[u8], encoding: Encoding) -> Result<Vec<u8>, MessageError> {
    match encoding {
        Encoding::Binary => Ok(body.to_vec()),
        Encoding::Base64 => {
            let stripped: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, stripped)
                .map_err(|_| MessageError::bad_transfer_encoding())
        }
        Encoding::QuotedPrintable => quoted_printable::decode(body, quoted_printable::ParseMode::Lenient)
            .map_err(|_| MessageError::bad_transfer_encoding()),
    }
}

fn decode_charset(bytes: &[u8], charset: &str) -> String {
    if charset.eq_ignore_ascii_case("utf-8") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_text_message() {
        let config = MessageConfig::default();
        let raw = b"Subject: hi\r\nFrom: alice@example.com\r\n\r\nhello world";
        let msg = parse_message(raw, &config, 0).unwrap();
        assert!(msg.valid());
        match &msg.root().content {
            Content::Text { unicode, .. } => assert_eq!(unicode, "hello world"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn parses_multipart_mixed_with_two_children() {
        let config = MessageConfig::default();
        let raw = b"Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\r\n--XYZ\r\nContent-Type: text/plain\r\n\r\npart one\r\n--XYZ\r\nContent-Type: text/plain\r\n\r\npart two\r\n--XYZ--\r\n";
        let msg = parse_message(raw, &config, 0).unwrap();
        assert_eq!(msg.root().children().len(), 2);
    }

    #[test]
    fn multipart_alternative_round_trips_through_rfc822(
    ) {
        // spec.md S4: a multipart/alternative message with a text/plain
        // and a text/html child, boundary "b", Subject "t".
        let config = MessageConfig::default();
        let raw = b"Subject: t\r\nContent-Type: multipart/alternative; boundary=\"b\"\r\n\r\n--b\r\nContent-Type: text/plain\r\n\r\nplain body\r\n--b\r\nContent-Type: text/html\r\n\r\n<p>html body</p>\r\n--b--\r\n";
        let msg = parse_message(raw, &config, 0).unwrap();
        assert_eq!(msg.header().first(FieldType::Subject).and_then(|f| f.text()), Some("t"));

        let rendered = msg.rfc822();
        let rendered_str = String::from_utf8_lossy(rendered);
        assert_eq!(rendered_str.matches("--b\r\n").count(), 2);
        assert_eq!(rendered_str.matches("--b--\r\n").count(), 1);
        assert!(rendered_str.contains("Subject: t\r\n"));

        let reparsed = parse_message(rendered, &config, 0).unwrap();
        assert_eq!(reparsed.rfc822(), msg.rfc822());
        assert_eq!(reparsed.root().children().len(), 2);
    }

    #[test]
    fn missing_boundary_on_multipart_is_an_error() {
        let config = MessageConfig::default();
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(parse_message(raw, &config, 0).is_err());
    }

    #[test]
    fn unterminated_multipart_is_an_error() {
        let config = MessageConfig::default();
        let raw = b"Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\r\n--XYZ\r\nContent-Type: text/plain\r\n\r\npart one\r\n";
        assert!(parse_message(raw, &config, 0).is_err());
    }

    #[test]
    fn lenient_parse_wraps_unparsable_input() {
        let config = MessageConfig::default();
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        let msg = parse_message_lenient(raw, &config, 0);
        assert!(msg.valid());
        assert!(msg.is_wrapped());
    }

    #[test]
    fn nested_message_rfc822_is_parsed() {
        let config = MessageConfig::default();
        let inner = b"Subject: inner\r\n\r\ninner body";
        let raw = format!(
            "Content-Type: message/rfc822\r\n\r\n{}",
            String::from_utf8_lossy(inner)
        );
        let msg = parse_message(raw.as_bytes(), &config, 0).unwrap();
        match &msg.root().content {
            Content::Message(nested) => {
                assert_eq!(
                    nested.header().first(FieldType::Subject).and_then(|f| f.text()),
                    Some("inner")
                );
            }
            _ => panic!("expected nested message"),
        }
    }
}
