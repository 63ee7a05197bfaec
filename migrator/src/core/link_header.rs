//! Parsing of `Link` pagination headers
//!
//! The header carries one or two comma-separated entries such as
//! `<https://shop/admin/api/2024-07/orders.json?limit=250&page_info=abc>; rel="next"`.

use url::Url;

/// Query parameter holding the continuation token
pub const PAGE_INFO_PARAM: &str = "page_info";

/// Opaque continuation marker for the next page of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorToken(String);

impl CursorToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tokens extracted from one `Link` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub next: Option<CursorToken>,
    pub previous: Option<CursorToken>,
}

/// Extract the `next`/`previous` tokens from a `Link` header value
pub fn parse_link_header(header: &str) -> PageLinks {
    let mut links = PageLinks::default();

    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let Some(target) = parts.next() else { continue };
        let target = target.trim().trim_start_matches('<').trim_end_matches('>');

        let rel = parts.find_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            (key.trim() == "rel").then(|| value.trim().trim_matches('"').to_string())
        });

        let Some(token) = page_info_from(target) else { continue };
        match rel.as_deref() {
            Some("next") => links.next = Some(token),
            Some("previous") | Some("prev") => links.previous = Some(token),
            _ => {}
        }
    }

    links
}

fn page_info_from(target: &str) -> Option<CursorToken> {
    // Relative targets still carry the query we need
    let url = Url::parse(target)
        .or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(target)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == PAGE_INFO_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .map(CursorToken::new)
}
