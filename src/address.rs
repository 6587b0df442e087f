//! The deduplicated address model (spec.md §3 `Address`).

/// A single (name, localpart, domain) triple. Per spec.md §3, equality
/// (and therefore deduplication) is keyed on
/// `(displayName, localpart, lowercase(domain))`. `id` is assigned
/// later by an `Injector` and plays no part in equality.
#[derive(Clone, Debug)]
pub struct Address {
    pub display_name: String,
    pub localpart: Vec<u8>,
    pub domain: String,
    /// Assigned by the injector's address helper-row creator once the
    /// row exists; `None` for an address not yet persisted.
    pub id: Option<i64>,
}

impl Address {
    pub fn new(display_name: impl Into<String>, localpart: impl Into<Vec<u8>>, domain: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            localpart: localpart.into(),
            domain: domain.into(),
            id: None,
        }
    }

    /// The `(displayName, localpart, lowercase(domain))` dedup key.
    pub fn dedup_key(&self) -> (String, Vec<u8>, String) {
        (
            self.display_name.clone(),
            self.localpart.clone(),
            self.domain.to_ascii_lowercase(),
        )
    }

    /// `localpart@domain`, as it would appear in an `addr-spec`.
    pub fn addr_spec(&self) -> String {
        format!(
            "{}@{}",
            String::from_utf8_lossy(&self.localpart),
            self.domain
        )
    }

    /// Renders as it would appear in an rfc822 address field:
    /// `"Display Name" <local@domain>` when a display name is present,
    /// bare `local@domain` otherwise.
    pub fn to_rfc822(&self) -> String {
        if self.display_name.is_empty() {
            self.addr_spec()
        } else {
            format!("{} <{}>", quote_phrase(&self.display_name), self.addr_spec())
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.dedup_key() == other.dedup_key()
    }
}
impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dedup_key().hash(state);
    }
}

fn quote_phrase(phrase: &str) -> String {
    let needs_quoting = phrase
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || " .-_'".contains(c)));
    if needs_quoting {
        format!("\"{}\"", phrase.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        phrase.to_string()
    }
}

/// Either a concrete address or a group of addresses (RFC 5322 `group`
/// syntax, e.g. `undisclosed-recipients:;`). Per spec.md §4.6, group
/// syntax flattens into the caller's address list; an empty group
/// produces no error.
#[derive(Clone, Debug)]
pub enum AddressListItem {
    Mailbox(Address),
    Group {
        name: String,
        members: Vec<Address>,
    },
}

/// Flattens a list of [`AddressListItem`] into plain addresses, per
/// spec.md §4.6's group-syntax rule.
pub fn flatten(items: &[AddressListItem]) -> Vec<Address> {
    let mut out = Vec::new();
    for item in items {
        match item {
            AddressListItem::Mailbox(a) => out.push(a.clone()),
            AddressListItem::Group { members, .. } => out.extend(members.iter().cloned()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_lowercases_domain_only() {
        let a = Address::new("Alice", b"Alice".to_vec(), "Example.COM");
        let b = Address::new("Alice", b"Alice".to_vec(), "example.com");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_eq!(a, b);
    }

    #[test]
    fn localpart_case_is_significant() {
        let a = Address::new("Alice", b"Alice".to_vec(), "example.com");
        let b = Address::new("Alice", b"alice".to_vec(), "example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn group_flattens_to_members() {
        let items = vec![
            AddressListItem::Mailbox(Address::new("", b"a".to_vec(), "x.com")),
            AddressListItem::Group {
                name: "undisclosed-recipients".into(),
                members: vec![],
            },
        ];
        assert_eq!(flatten(&items).len(), 1);
    }
}
