//! Monitored target definitions and their validation.
//!
//! Everything that reaches the registry has already passed through
//! [`NewTarget::parse`] or [`TargetUpdate::parse`], so the scheduler never sees an
//! invalid URL, a non-positive interval or a pattern that does not compile.

use regex::Regex;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Interval must be a positive number of seconds, got {0}")]
    InvalidInterval(i32),
    #[error("Invalid validation pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A compiled validation pattern. Equality is defined on the pattern source.
#[derive(Clone, Debug)]
pub struct ValidationPattern(Regex);

impl ValidationPattern {
    /// Compiles `pattern`. An empty pattern means "no pattern configured".
    pub fn parse(pattern: &str) -> Result<Option<Self>, TargetError> {
        if pattern.is_empty() {
            return Ok(None);
        }
        Regex::new(pattern)
            .map(|regex| Some(Self(regex)))
            .map_err(|e| TargetError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// First-match semantics: true if the pattern occurs anywhere in `body`.
    pub fn is_match(&self, body: &str) -> bool {
        self.0.is_match(body)
    }
}

impl PartialEq for ValidationPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ValidationPattern {}

/// Parses and normalizes a target URL. The normalized form is what the
/// registry compares for uniqueness.
pub fn normalize_url(raw: &str) -> Result<String, TargetError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| TargetError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url.to_string())
}

pub fn interval_from_seconds(seconds: i32) -> Result<Duration, TargetError> {
    if seconds <= 0 {
        return Err(TargetError::InvalidInterval(seconds));
    }
    Ok(Duration::from_secs(seconds as u64))
}

/// A monitored target as held by the registry. Clones of it are the read-only
/// snapshots handed to per-target tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub id: i32,
    pub url: String,
    pub interval: Duration,
    pub pattern: Option<ValidationPattern>,
}

impl Target {
    pub fn interval_seconds(&self) -> i32 {
        self.interval.as_secs() as i32
    }

    pub fn pattern_str(&self) -> Option<&str> {
        self.pattern.as_ref().map(ValidationPattern::as_str)
    }

    /// True when a task started from `self` would behave exactly like one
    /// started from `other`.
    pub fn same_schedule(&self, other: &Target) -> bool {
        self.url == other.url && self.interval == other.interval && self.pattern == other.pattern
    }
}

/// A validated registration request that has not been assigned an id yet.
#[derive(Clone, Debug)]
pub struct NewTarget {
    pub url: String,
    pub interval: Duration,
    pub pattern: Option<ValidationPattern>,
}

impl NewTarget {
    pub fn parse(url: &str, interval_seconds: i32, pattern: Option<&str>) -> Result<Self, TargetError> {
        Ok(Self {
            url: normalize_url(url)?,
            interval: interval_from_seconds(interval_seconds)?,
            pattern: match pattern {
                Some(p) => ValidationPattern::parse(p)?,
                None => None,
            },
        })
    }

    pub(crate) fn into_target(self, id: i32) -> Target {
        Target {
            id,
            url: self.url,
            interval: self.interval,
            pattern: self.pattern,
        }
    }
}

/// Changes applied by [`TargetRegistry::update`](super::registry::TargetRegistry::update).
///
/// `pattern: Some(None)` clears the configured pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetUpdate {
    pub interval: Option<Duration>,
    pub pattern: Option<Option<ValidationPattern>>,
}

impl TargetUpdate {
    pub fn parse(interval_seconds: Option<i32>, pattern: Option<&str>) -> Result<Self, TargetError> {
        Ok(Self {
            interval: interval_seconds.map(interval_from_seconds).transpose()?,
            pattern: pattern.map(ValidationPattern::parse).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.interval.is_none() && self.pattern.is_none()
    }

    pub(crate) fn apply(&self, target: &mut Target) {
        if let Some(interval) = self.interval {
            target.interval = interval;
        }
        if let Some(pattern) = &self.pattern {
            target.pattern = pattern.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_accepts_http_and_https() {
        assert_eq!(normalize_url("https://Example.COM").unwrap(), "https://example.com/");
        assert_eq!(
            normalize_url("  http://example.com:8080/status?x=1 ").unwrap(),
            "http://example.com:8080/status?x=1"
        );
    }

    #[test]
    fn test_normalize_url_rejects_other_schemes_and_relative_urls() {
        assert!(matches!(
            normalize_url("ftp://example.com"),
            Err(TargetError::InvalidUrl { .. })
        ));
        assert!(matches!(
            normalize_url("example.com"),
            Err(TargetError::InvalidUrl { .. })
        ));
        assert!(matches!(normalize_url(""), Err(TargetError::InvalidUrl { .. })));
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert_eq!(interval_from_seconds(0), Err(TargetError::InvalidInterval(0)));
        assert_eq!(interval_from_seconds(-5), Err(TargetError::InvalidInterval(-5)));
        assert_eq!(interval_from_seconds(30).unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_pattern_parsing() {
        assert!(ValidationPattern::parse("").unwrap().is_none());
        let pattern = ValidationPattern::parse("OK").unwrap().unwrap();
        assert!(pattern.is_match("system OK"));
        assert!(!pattern.is_match("down"));
        assert!(matches!(
            ValidationPattern::parse("(unclosed"),
            Err(TargetError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_update_with_empty_pattern_clears_it() {
        let mut target = NewTarget::parse("https://example.com", 10, Some("OK"))
            .unwrap()
            .into_target(1);
        let update = TargetUpdate::parse(None, Some("")).unwrap();
        assert!(!update.is_empty());
        update.apply(&mut target);
        assert_eq!(target.pattern, None);
        assert_eq!(target.interval, Duration::from_secs(10));
    }

    #[test]
    fn test_same_schedule_compares_interval_and_pattern() {
        let a = NewTarget::parse("https://example.com", 10, Some("OK"))
            .unwrap()
            .into_target(1);
        let mut b = a.clone();
        assert!(a.same_schedule(&b));
        b.interval = Duration::from_secs(20);
        assert!(!a.same_schedule(&b));
    }
}
