//! Wrapped URLs: `<endpoint>?url=<percent-encoded absolute URL>`.
//!
//! Server-side counterpart of the interceptor script's `wrapUrl`, used by the
//! CLI. Percent-encoding differs only in that `!'()*` are escaped here and
//! left alone by `encodeURIComponent`; both decode to the same target.

use url::Url;

/// Prefix every wrapped URL starts with.
pub fn proxy_marker(endpoint: &str) -> String {
    format!("{endpoint}?url=")
}

/// True when `target` already routes through the proxy.
pub fn is_wrapped(endpoint: &str, target: &str) -> bool {
    target.contains(&proxy_marker(endpoint))
}

/// Wrap `target`, resolved against `base`, into a proxy URL.
///
/// Empty input yields an empty string, already-wrapped input is returned
/// unchanged, and unresolvable input is returned as-is.
pub fn wrap_url(endpoint: &str, base: &Url, target: &str) -> String {
    if target.is_empty() {
        return String::new();
    }
    if is_wrapped(endpoint, target) {
        return target.to_string();
    }
    match base.join(target) {
        Ok(absolute) => format!(
            "{}{}",
            proxy_marker(endpoint),
            urlencoding::encode(absolute.as_str())
        ),
        Err(_) => target.to_string(),
    }
}

/// Extract the target from a wrapped URL.
pub fn unwrap_url(endpoint: &str, wrapped: &str) -> Option<String> {
    let marker = proxy_marker(endpoint);
    let start = wrapped.find(&marker)? + marker.len();
    let encoded = wrapped[start..].split('&').next().unwrap_or("");
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

/// Merge GET form fields into an action URL's query.
///
/// Each field replaces the first same-named parameter and drops the rest,
/// so the last field with a given name wins.
pub fn merge_form_fields<'a, I>(action: &mut Url, fields: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<(String, String)> = action.query_pairs().into_owned().collect();

    for (name, value) in fields {
        match pairs.iter().position(|(n, _)| n == name) {
            Some(first) => {
                pairs[first].1 = value.to_string();
                let mut index = 0;
                pairs.retain(|(n, _)| {
                    let keep = index <= first || n != name;
                    index += 1;
                    keep
                });
            }
            None => pairs.push((name.to_string(), value.to_string())),
        }
    }

    if pairs.is_empty() {
        action.set_query(None);
    } else {
        action.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "/api/proxy";

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_wrap_relative() {
        assert_eq!(
            wrap_url(ENDPOINT, &base(), "/about"),
            "/api/proxy?url=https%3A%2F%2Fexample.com%2Fabout"
        );
    }

    #[test]
    fn test_wrap_absolute_other_origin() {
        assert_eq!(
            wrap_url(ENDPOINT, &base(), "http://other.test/x?y=1"),
            "/api/proxy?url=http%3A%2F%2Fother.test%2Fx%3Fy%3D1"
        );
    }

    #[test]
    fn test_wrap_is_idempotent() {
        let once = wrap_url(ENDPOINT, &base(), "/a/b");
        let twice = wrap_url(ENDPOINT, &base(), &once);
        assert_eq!(once, twice);

        let absolute = "http://localhost:8080/api/proxy?url=https%3A%2F%2Fexample.com%2F";
        assert_eq!(wrap_url(ENDPOINT, &base(), absolute), absolute);
    }

    #[test]
    fn test_wrap_empty() {
        assert_eq!(wrap_url(ENDPOINT, &base(), ""), "");
    }

    #[test]
    fn test_wrap_unresolvable_fails_open() {
        assert_eq!(wrap_url(ENDPOINT, &base(), "http://[::1"), "http://[::1");
    }

    #[test]
    fn test_unwrap_roundtrip() {
        let wrapped = wrap_url(ENDPOINT, &base(), "/search?q=a b");
        assert_eq!(
            unwrap_url(ENDPOINT, &format!("{wrapped}&t=123")).as_deref(),
            Some("https://example.com/search?q=a%20b")
        );
        assert_eq!(unwrap_url(ENDPOINT, "/elsewhere?url=x"), None);
    }

    #[test]
    fn test_get_form_round_trip() {
        let mut action = base().join("/search").unwrap();
        merge_form_fields(&mut action, [("q", "cats")]);

        assert_eq!(action.as_str(), "https://example.com/search?q=cats");
        assert_eq!(
            wrap_url(ENDPOINT, &base(), action.as_str()),
            format!("/api/proxy?url={}", urlencoding::encode("https://example.com/search?q=cats"))
        );
    }

    #[test]
    fn test_form_fields_overwrite_query() {
        let mut action = Url::parse("https://example.com/s?q=dogs&page=2&q=birds").unwrap();
        merge_form_fields(&mut action, [("q", "cats"), ("lang", "en")]);
        assert_eq!(action.as_str(), "https://example.com/s?q=cats&page=2&lang=en");
    }

    #[test]
    fn test_form_fields_last_write_wins() {
        let mut action = Url::parse("https://example.com/s").unwrap();
        merge_form_fields(&mut action, [("tag", "a"), ("tag", "b")]);
        assert_eq!(action.as_str(), "https://example.com/s?tag=b");
    }

    #[test]
    fn test_no_fields_no_query() {
        let mut action = Url::parse("https://example.com/s").unwrap();
        merge_form_fields(&mut action, []);
        assert_eq!(action.as_str(), "https://example.com/s");
    }
}
