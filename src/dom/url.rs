//! Location helpers: query-string parsing and the asset base path.

use rustc_hash::FxHashMap;

/// Decode `application/x-www-form-urlencoded` text (`+` and `%XX`).
/// Malformed escapes are kept verbatim.
fn decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let digits = &bytes[i + 1..i + 3];
                let hex = digits
                    .iter()
                    .all(u8::is_ascii_hexdigit)
                    .then(|| std::str::from_utf8(digits).ok())
                    .flatten()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = hex {
                    out.push(byte);
                    i += 3;
                    continue;
                }
                out.push(b'%');
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
}

/// First value of `name` in a `location.search` string.
#[must_use]
pub fn query_param(query: &str, name: &str) -> Option<String> {
    pairs(query).find(|(k, _)| k == name).map(|(_, v)| v)
}

/// Every parameter of a `location.search` string; later duplicates win.
#[must_use]
pub fn query_params(query: &str) -> FxHashMap<String, String> {
    pairs(query).collect()
}

/// Relative prefix for site assets: pages under `/projects/` live one level
/// down.
#[must_use]
pub fn base_path(path: &str) -> &'static str {
    if path.contains("/projects/") {
        "../"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_single_params() {
        let q = "?motion=reduce&name=Ada+Lovelace&x=%41%42";
        assert_eq!(query_param(q, "motion").as_deref(), Some("reduce"));
        assert_eq!(query_param(q, "name").as_deref(), Some("Ada Lovelace"));
        assert_eq!(query_param(q, "x").as_deref(), Some("AB"));
        assert_eq!(query_param(q, "missing"), None);
        assert_eq!(query_param("", "motion"), None);
    }

    #[test]
    fn keeps_malformed_escapes_and_flags() {
        let params = query_params("debug&pct=50%&pct=75%25");
        assert_eq!(params.get("debug").map(String::as_str), Some(""));
        assert_eq!(params.get("pct").map(String::as_str), Some("75%"));
    }

    #[test]
    fn project_pages_use_parent_base() {
        assert_eq!(base_path("/projects/ledger.html"), "../");
        assert_eq!(base_path("/index.html"), "");
    }
}
