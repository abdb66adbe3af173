//! Qualified name handling.
//!
//! A `QName` is `prefix:local` or just `local`. Both the XML parser and the
//! path expression lexer classify name characters with the predicates here so
//! that a name accepted in a document is also accepted in a query.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

/// Splits a `QName` into its prefix and local name.
///
/// # Examples
///
/// ```
/// use xmlbridge::util::qname::split_qname;
///
/// assert_eq!(split_qname("cbc:ID"), (Some("cbc"), "ID"));
/// assert_eq!(split_qname("Invoice"), (None, "Invoice"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// XML 1.0 (Fifth Edition) `NameStartChar`.
#[must_use]
pub fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | '_' | 'A'..='Z' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// XML 1.0 (Fifth Edition) `NameChar`.
#[must_use]
pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9'
            | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Returns `true` if `name` is a non-colonized name (`NCName`).
#[must_use]
pub fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first != ':' && is_name_start_char(first) => {
            chars.all(|c| c != ':' && is_name_char(c))
        }
        _ => false,
    }
}

/// Returns `true` if `name` is a well-formed `QName`: one `NCName`, or two
/// joined by a single colon.
#[must_use]
pub fn is_qname(name: &str) -> bool {
    match split_qname(name) {
        (Some(prefix), local) => is_ncname(prefix) && is_ncname(local),
        (None, local) => is_ncname(local),
    }
}
