mod endpoints;
pub(crate) mod gemini;
pub(crate) mod token;

use url::Url;

pub(crate) use endpoints::EndpointCandidates;

/// Query parameter carrying the API key when it is not sent as a header.
pub(crate) const API_KEY_QUERY_PARAMETER: &str = "key";

/// Render a URL for logging with the API key replaced by `[REDACTED]`.
pub fn redact_url(url: &Url) -> String {
    let Some(query) = url.query() else {
        return url.to_string();
    };

    let query: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((API_KEY_QUERY_PARAMETER, _)) => format!("{API_KEY_QUERY_PARAMETER}=[REDACTED]"),
            _ => pair.to_string(),
        })
        .collect();

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    format!("{base}?{}", query.join("&"))
}
