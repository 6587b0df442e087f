//! Parsed Content-Type value: media-type, subtype, and a case-insensitive
//! parameter map (spec.md §3 `HeaderField`, Content-Type case), with
//! RFC 2231 extended-parameter decoding (spec.md §4.6).

use std::collections::BTreeMap;

/// A parsed `Content-Type` (or `Content-Disposition`) value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentType {
    pub media_type: String,
    pub subtype: String,
    /// Parameter names are folded to lowercase at insertion so lookups
    /// are case-insensitive, per spec.md §3.
    params: BTreeMap<String, String>,
}

impl ContentType {
    pub fn new(media_type: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            subtype: subtype.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn remove_param(&mut self, name: &str) {
        self.params.remove(&name.to_ascii_lowercase());
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("multipart")
    }

    pub fn is_message_rfc822(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("message")
            && self.subtype.eq_ignore_ascii_case("rfc822")
    }

    pub fn is_text(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("text")
    }

    pub fn is_text_html(&self) -> bool {
        self.is_text() && self.subtype.eq_ignore_ascii_case("html")
    }

    /// `multipart/digest`'s default child content-type is
    /// `message/rfc822` rather than `text/plain` (spec.md §4.6).
    pub fn is_digest(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("multipart")
            && self.subtype.eq_ignore_ascii_case("digest")
    }

    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// Renders `type/subtype; name=value; ...` for serialisation
    /// (spec.md §4.6 `rfc822()`).
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}/{}", self.media_type, self.subtype);
        for (name, value) in &self.params {
            out.push_str("; ");
            out.push_str(name);
            out.push('=');
            if needs_quoting(value) {
                out.push('"');
                out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
                out.push('"');
            } else {
                out.push_str(value);
            }
        }
        out
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || "-_.".contains(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_lookup_is_case_insensitive() {
        let mut ct = ContentType::new("text", "plain");
        ct.set_param("Charset", "UTF-8");
        assert_eq!(ct.param("CHARSET"), Some("UTF-8"));
    }

    #[test]
    fn header_value_quotes_boundary() {
        let mut ct = ContentType::new("multipart", "mixed");
        ct.set_param("boundary", "abc=123");
        assert_eq!(ct.to_header_value(), r#"multipart/mixed; boundary="abc=123""#);
    }

    #[test]
    fn digest_default_child_type_flag() {
        assert!(ContentType::new("multipart", "digest").is_digest());
        assert!(!ContentType::new("multipart", "mixed").is_digest());
    }
}
