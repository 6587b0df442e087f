//! RFC 2047 encoded-word decoding (`=?charset?encoding?text?=`), used
//! when unfolding display names and other free-text header values.
//! Grounded on the teacher's `decoders::encoded_word`-style pragmatic
//! decode-or-pass-through approach: a malformed encoded word is left
//! verbatim rather than erroring the whole field.

use base64::Engine;

/// Decodes every RFC 2047 encoded word in `input`, leaving anything
/// that is not a well-formed encoded word untouched. Adjacent encoded
/// words separated only by whitespace have that whitespace elided per
/// RFC 2047 §6.2.
pub fn decode(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    let mut last_was_encoded = false;
    loop {
        match find_encoded_word(rest) {
            Some((before, decoded, after)) => {
                if last_was_encoded && before.chars().all(|c| c.is_whitespace()) {
                    // elide inter-word whitespace between two encoded words
                } else {
                    out.push_str(before);
                }
                out.push_str(&decoded);
                rest = after;
                last_was_encoded = true;
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

fn find_encoded_word(input: &str) -> Option<(&str, String, &str)> {
    let start = input.find("=?")?;
    let after_marker = &input[start + 2..];
    let charset_end = after_marker.find('?')?;
    let charset = &after_marker[..charset_end];
    if charset.is_empty() {
        return None;
    }
    let after_charset = &after_marker[charset_end + 1..];
    let mut enc_chars = after_charset.chars();
    let encoding = enc_chars.next()?;
    if after_charset.as_bytes().get(1) != Some(&b'?') {
        return None;
    }
    let after_encoding = &after_charset[2..];
    let text_end = after_encoding.find("?=")?;
    let encoded_text = &after_encoding[..text_end];
    let decoded_bytes = match encoding.to_ascii_uppercase() {
        'B' => base64::engine::general_purpose::STANDARD
            .decode(encoded_text)
            .ok()?,
        'Q' => decode_q(encoded_text),
        _ => return None,
    };
    let decoded = decode_with_charset(&decoded_bytes, charset);
    let after = &after_encoding[text_end + 2..];
    Some((&input[..start], decoded, after))
}

/// RFC 2047 "Q" encoding: like quoted-printable but `_` means space.
fn decode_q(input: &str) -> Vec<u8> {
    let substituted = input.replace('_', " ");
    quoted_printable::decode(substituted.as_bytes(), quoted_printable::ParseMode::Lenient)
        .unwrap_or_else(|_| substituted.into_bytes())
}

fn decode_with_charset(bytes: &[u8], charset: &str) -> String {
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes())
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_b_encoded_word() {
        // "héllo" in UTF-8, base64-encoded.
        let input = "=?UTF-8?B?aMOpbGxv?=";
        assert_eq!(decode(input), "héllo");
    }

    #[test]
    fn decodes_q_encoded_word_with_underscore_space() {
        let input = "=?UTF-8?Q?Hello_World?=";
        assert_eq!(decode(input), "Hello World");
    }

    #[test]
    fn passes_through_plain_text() {
        assert_eq!(decode("plain text"), "plain text");
    }

    #[test]
    fn elides_whitespace_between_adjacent_encoded_words() {
        let input = "=?UTF-8?Q?Hello?= =?UTF-8?Q?World?=";
        assert_eq!(decode(input), "HelloWorld");
    }
}
