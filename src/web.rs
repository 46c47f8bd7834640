//! URL normalization and domain derivation helpers shared across the crate.

use url::Url;

/// Normalize a URL to `scheme://host/path` form.
///
/// Drops query and fragment, lowercases the host, and strips a trailing
/// slash so `https://example.com/about/` and `https://example.com/about`
/// collapse to the same visited-set key.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("").to_lowercase();
            let path = parsed.path().trim_end_matches('/');
            format!("{}://{}{}", parsed.scheme(), host, path)
        }
        Err(_) => {
            // Unparseable input: best effort, strip fragment and trailing slash
            let raw = raw.trim();
            let raw = raw.split('#').next().unwrap_or(raw);
            raw.trim_end_matches('/').to_string()
        }
    }
}

/// Derive the canonical domain for learner and budget keys.
///
/// Host lowercased with a leading `www.` stripped; empty string when the
/// URL has no host.
pub fn domain_of(raw: &str) -> String {
    let host = match Url::parse(raw.trim()) {
        Ok(parsed) => parsed.host_str().unwrap_or("").to_lowercase(),
        Err(_) => return String::new(),
    };
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

/// Second-level domain label of a host: `acme` for `www.acme.com`.
///
/// Steps past common registry labels so `acme.co.uk` also yields `acme`.
pub fn second_level_label(host: &str) -> Option<&str> {
    let parts: Vec<&str> = host.split('.').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return None;
    }
    let mut idx = parts.len() - 2;
    let tld = parts[parts.len() - 1];
    if parts.len() >= 3
        && tld.len() == 2
        && matches!(parts[idx], "co" | "com" | "org" | "net" | "ac" | "gov" | "edu")
    {
        idx -= 1;
    }
    Some(parts[idx])
}

/// Whether `candidate` is `base` or a subdomain of it.
pub fn domain_matches(candidate: &str, base: &str) -> bool {
    !candidate.is_empty() && (candidate == base || candidate.ends_with(&format!(".{base}")))
}

/// Whether the URL uses an http(s) scheme.
pub fn is_http(raw: &str) -> bool {
    let lower = raw.trim_start().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resolve a possibly-relative href against a base page URL.
///
/// Returns `None` for hrefs that cannot produce a fetchable absolute URL.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let joined = base.join(href.trim()).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}
