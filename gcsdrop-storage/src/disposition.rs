//! `Content-Disposition: attachment` header construction

use axum::http::HeaderValue;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// RFC 5987 `attr-char` is left as-is, everything else is encoded
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Build `attachment; filename="<filename>"`.
///
/// Control characters are dropped and `"`/`\` are escaped as quoted-pairs.
/// Non-ASCII names get an ASCII fallback in `filename` plus an RFC 5987
/// `filename*` parameter carrying the exact UTF-8 name.
pub fn attachment(filename: &str) -> HeaderValue {
    let cleaned: String = filename.chars().filter(|c| !c.is_control()).collect();

    let mut value = String::with_capacity(cleaned.len() + 24);
    value.push_str("attachment; filename=\"");
    for c in cleaned.chars() {
        match c {
            '"' | '\\' => {
                value.push('\\');
                value.push(c);
            }
            c if c.is_ascii() => value.push(c),
            _ => value.push('_'),
        }
    }
    value.push('"');

    if !cleaned.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        value.extend(utf8_percent_encode(&cleaned, ATTR_CHAR));
    }

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
