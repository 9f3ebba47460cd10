//! Initiator domain allow-list

use std::collections::BTreeSet;

use url::Url;

/// Normalized set of domains a responder will talk to
///
/// Absence of a set (`Option::None`) means "unrestricted"; a set is never
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedDomains {
    domains: BTreeSet<String>,
}

impl AllowedDomains {
    /// Normalize every entry and drop the invalid ones.
    ///
    /// Returns `None` when nothing survives, which callers treat as
    /// unrestricted.
    pub fn build<I, S>(raw: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains: BTreeSet<String> = raw
            .into_iter()
            .filter_map(|entry| normalize(entry.as_ref()))
            .collect();
        (!domains.is_empty()).then_some(Self { domains })
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Reduce a user-supplied domain or URL to a bare lower-case host
pub fn normalize(domain: &str) -> Option<String> {
    let mut candidate = domain.trim().to_lowercase();
    if candidate.is_empty() {
        return None;
    }
    if candidate.contains("://") {
        candidate = Url::parse(&candidate)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .unwrap_or_default();
    }

    let host = candidate
        .split('/')
        .next()
        .and_then(|rest| rest.split(':').next())
        .unwrap_or_default()
        .trim();
    if host.is_empty() {
        return None;
    }
    host.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        .then(|| host.to_owned())
}

/// `true` when no allow-list is configured or `domain` is a member
pub fn is_allowed(allowed: Option<&AllowedDomains>, domain: &str) -> bool {
    allowed.map_or(true, |set| set.contains(domain))
}
