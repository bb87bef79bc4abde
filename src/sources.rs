/// Open-data portal of the Generalitat de Catalunya.
pub const DEFAULT_DOMAIN: &str = "analisi.transparenciacatalunya.cat";

/// Bare hosts get `https://`; an `http(s)` URL is used as-is.
pub fn domain_to_base_url(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if is_http_url(domain) {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
