use bytes::Bytes;

use crate::header::{Entry, HeaderMap, HeaderValue, OccupiedEntry};

const SUMMARY_LIMIT: usize = 120;

pub fn basic_auth<U, P>(username: U, password: Option<P>) -> HeaderValue
where
    U: std::fmt::Display,
    P: std::fmt::Display,
{
    use base64::prelude::BASE64_STANDARD;
    use base64::write::EncoderWriter;
    use std::io::Write;

    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = write!(encoder, "{}:", username);
        if let Some(password) = password {
            let _ = write!(encoder, "{}", password);
        }
    }
    let mut header = match HeaderValue::from_bytes(&buf) {
        Ok(header) => header,
        // base64 output and the "Basic " prefix are always visible ASCII
        Err(_) => HeaderValue::from_static("Basic"),
    };
    header.set_sensitive(true);
    header
}

/// Overwrite every header of `src` into `dst`, keeping all values of a
/// multi-valued header.
pub(crate) fn replace_headers(dst: &mut HeaderMap, src: HeaderMap) {
    // IntoIter of HeaderMap yields (Option<HeaderName>, HeaderValue).
    // The first time a name is yielded, it will be Some(name), and if
    // there are more values with the same name, the next yield will be
    // None.

    let mut prev_entry: Option<OccupiedEntry<_>> = None;
    for (key, value) in src {
        match key {
            Some(key) => match dst.entry(key) {
                Entry::Occupied(mut e) => {
                    e.insert(value);
                    prev_entry = Some(e);
                }
                Entry::Vacant(e) => {
                    let e = e.insert_entry(value);
                    prev_entry = Some(e);
                }
            },
            None => match prev_entry {
                Some(ref mut entry) => {
                    entry.append(value);
                }
                None => unreachable!("HeaderMap::into_iter yielded None first"),
            },
        }
    }
}

/// Printable prefix of a response body, used in error messages.
///
/// Returns `None` for empty or binary bodies.
pub(crate) fn body_summary(body: &Bytes) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    let head = &body[..body.len().min(SUMMARY_LIMIT)];
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        // cut inside a multi-byte character
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&head[..e.valid_up_to()]).ok()?,
        Err(_) => return None,
    };

    if text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return None;
    }

    let mut summary = text.to_owned();
    if body.len() > SUMMARY_LIMIT {
        summary.push_str(" (truncated...)");
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header() {
        let header = basic_auth("Aladdin", Some("open sesame"));
        assert_eq!(header, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert!(header.is_sensitive());

        let header = basic_auth("user", None::<&str>);
        assert_eq!(header, "Basic dXNlcjo=");
    }

    #[test]
    fn replace_headers_keeps_multiple_values() {
        let mut dst = HeaderMap::new();
        dst.insert("x-a", HeaderValue::from_static("old"));
        dst.insert("x-b", HeaderValue::from_static("kept"));

        let mut src = HeaderMap::new();
        src.append("x-a", HeaderValue::from_static("1"));
        src.append("x-a", HeaderValue::from_static("2"));

        replace_headers(&mut dst, src);
        let values: Vec<_> = dst.get_all("x-a").iter().collect();
        assert_eq!(values, ["1", "2"]);
        assert_eq!(dst["x-b"], "kept");
    }

    #[test]
    fn summary_of_text_and_binary_bodies() {
        assert_eq!(body_summary(&Bytes::new()), None);
        assert_eq!(
            body_summary(&Bytes::from_static(b"not found")).as_deref(),
            Some("not found")
        );
        assert_eq!(body_summary(&Bytes::from_static(b"\x00\x01\x02")), None);

        let long = Bytes::from("a".repeat(200));
        let summary = body_summary(&long).unwrap();
        assert!(summary.starts_with(&"a".repeat(120)));
        assert!(summary.ends_with(" (truncated...)"));
    }
}
