use crate::core::geo::GeoResolver;
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

pub const SCORE_CAP: u32 = 100;
pub const SCORE_EMPTY_UA: u32 = 35;
pub const SCORE_UA_PATTERN: u32 = 50;
pub const SCORE_MISSING_REFERER: u32 = 35;
pub const SCORE_REFERER_MISMATCH: u32 = 50;
pub const SCORE_GEO: u32 = 50;

fn default_true() -> bool {
    true
}

fn default_flag_threshold() -> u32 {
    70
}

fn default_ua_patterns() -> Vec<String> {
    [
        r"bot\b",
        r"crawl",
        r"spider",
        r"scraper",
        r"headless",
        r"phantomjs",
        r"selenium",
        r"puppeteer",
        r"curl/",
        r"wget/",
        r"python-requests",
        r"go-http-client",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvtConfig {
    /// Scoring runs and is recorded; default on
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,

    /// Flagged traffic is rejected with 403; default off
    /// (monitoring-only unless explicitly enabled)
    #[serde(default)]
    pub blocking_enabled: bool,

    #[serde(default = "default_true")]
    pub check_ua: bool,

    #[serde(default = "default_true")]
    pub check_referer: bool,

    #[serde(default = "default_true")]
    pub check_geo: bool,

    /// Strict mode: a missing referer contributes to the score
    #[serde(default)]
    pub require_referer: bool,

    /// ISO country allowlist; empty means allow all
    #[serde(default)]
    pub allowed_countries: Vec<String>,

    #[serde(default)]
    pub blocked_countries: Vec<String>,

    /// Case-insensitive UA regexes
    #[serde(default = "default_ua_patterns")]
    pub ua_patterns: Vec<String>,

    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: u32,
}

impl Default for IvtConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            blocking_enabled: false,
            check_ua: true,
            check_referer: true,
            check_geo: true,
            require_referer: false,
            allowed_countries: Vec::new(),
            blocked_countries: Vec::new(),
            ua_patterns: default_ua_patterns(),
            flag_threshold: default_flag_threshold(),
        }
    }
}

#[derive(Debug, Default)]
pub struct IvtVerdict {
    pub score: u32,
    pub flagged: bool,
    pub blocked: bool,
    pub reasons: Vec<&'static str>,
}

pub struct IvtInput<'a> {
    pub ua: Option<&'a str>,
    pub referer: Option<&'a str>,
    pub request_domain: Option<&'a str>,
    pub ip: Option<IpAddr>,
}

struct CompiledPatterns {
    version: u64,
    set: RegexSet,
}

/// Invalid-traffic scorer.
///
/// Compiled UA patterns are paired with a monotonically increasing
/// version counter: config updates bump the counter, and readers
/// recompile under the write lock only when their cached version is
/// stale. A one-shot initialiser is deliberately not used here, since
/// resetting one to force a recompile races with readers mid-call.
pub struct IvtScorer {
    config: ArcSwap<IvtConfig>,
    pattern_version: AtomicU64,
    compiled: RwLock<CompiledPatterns>,
    geo: Option<Arc<GeoResolver>>,
}

impl IvtScorer {
    pub fn new(config: IvtConfig, geo: Option<Arc<GeoResolver>>) -> Self {
        let set = compile_patterns(&config.ua_patterns);

        Self {
            config: ArcSwap::from_pointee(config),
            pattern_version: AtomicU64::new(1),
            compiled: RwLock::new(CompiledPatterns { version: 1, set }),
            geo,
        }
    }

    /// Swap config and bump the pattern version; readers pick up the
    /// new patterns on their next scoring call
    pub fn update_config(&self, config: IvtConfig) {
        self.config.store(Arc::new(config));
        self.pattern_version.fetch_add(1, Ordering::Release);
    }

    pub fn config(&self) -> Arc<IvtConfig> {
        self.config.load_full()
    }

    pub fn score(&self, input: &IvtInput) -> IvtVerdict {
        let config = self.config.load();

        if !config.monitoring_enabled {
            return IvtVerdict::default();
        }

        let mut score = 0u32;
        let mut reasons = Vec::new();

        if config.check_ua {
            match input.ua.map(str::trim) {
                None | Some("") => {
                    score += SCORE_EMPTY_UA;
                    reasons.push("empty_ua");
                }
                Some(ua) => {
                    if self.ua_matches(ua) {
                        score += SCORE_UA_PATTERN;
                        reasons.push("ua_pattern");
                    }
                }
            }
        }

        if config.check_referer {
            match input.referer.map(str::trim) {
                None | Some("") => {
                    if config.require_referer {
                        score += SCORE_MISSING_REFERER;
                        reasons.push("missing_referer");
                    }
                }
                Some(referer) => {
                    if let (Some(referer_domain), Some(request_domain)) =
                        (extract_domain(referer), input.request_domain)
                    {
                        if !domains_related(&referer_domain, request_domain) {
                            score += SCORE_REFERER_MISMATCH;
                            reasons.push("referer_mismatch");
                        }
                    }
                }
            }
        }

        if config.check_geo {
            if let (Some(geo), Some(ip)) = (&self.geo, input.ip) {
                match geo.country(ip) {
                    Some(country) => {
                        if !config.allowed_countries.is_empty()
                            && !config
                                .allowed_countries
                                .iter()
                                .any(|c| c.eq_ignore_ascii_case(&country))
                        {
                            score += SCORE_GEO;
                            reasons.push("geo_not_allowed");
                        }

                        if config
                            .blocked_countries
                            .iter()
                            .any(|c| c.eq_ignore_ascii_case(&country))
                        {
                            score += SCORE_GEO;
                            reasons.push("geo_blocked");
                        }
                    }
                    None => debug!("No geo entry for client ip"),
                }
            }
        }

        let score = score.min(SCORE_CAP);
        let flagged = score >= config.flag_threshold;
        let blocked = flagged && config.blocking_enabled;

        if flagged {
            metrics::counter!("vex_ivt_flagged_total").increment(1);
        }
        if blocked {
            metrics::counter!("vex_ivt_blocked_total").increment(1);
        }

        IvtVerdict {
            score,
            flagged,
            blocked,
            reasons,
        }
    }

    fn ua_matches(&self, ua: &str) -> bool {
        let current = self.pattern_version.load(Ordering::Acquire);

        {
            let compiled = self.compiled.read();
            if compiled.version == current {
                return compiled.set.is_match(ua);
            }
        }

        let mut compiled = self.compiled.write();
        if compiled.version != current {
            compiled.set = compile_patterns(&self.config.load().ua_patterns);
            compiled.version = current;
            debug!("Recompiled IVT UA patterns at version {}", current);
        }

        compiled.set.is_match(ua)
    }
}

fn compile_patterns(patterns: &[String]) -> RegexSet {
    let valid: Vec<String> = patterns
        .iter()
        .filter(|p| {
            let ok = regex::Regex::new(p).is_ok();
            if !ok {
                warn!("Dropping invalid IVT UA pattern: {}", p);
            }
            ok
        })
        .map(|p| format!("(?i){p}"))
        .collect();

    RegexSet::new(&valid).unwrap_or_else(|e| {
        warn!("IVT pattern set failed to compile: {}", e);
        RegexSet::empty()
    })
}

/// Strip scheme, path, port and userinfo down to the bare host
pub fn extract_domain(url: &str) -> Option<String> {
    let mut rest = url.trim();

    if let Some((_, after)) = rest.split_once("://") {
        rest = after;
    }

    if let Some((_, after)) = rest.split_once('@') {
        rest = after;
    }

    let host = rest
        .split(['/', '?', '#'])
        .next()?
        .split(':')
        .next()?
        .trim()
        .to_ascii_lowercase();

    if host.is_empty() { None } else { Some(host) }
}

/// Same registrable site when equal or one is a subdomain of the other
fn domains_related(a: &str, b: &str) -> bool {
    let b = b.to_ascii_lowercase();

    a == b || a.ends_with(&format!(".{b}")) || b.ends_with(&format!(".{a}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer(config: IvtConfig) -> IvtScorer {
        IvtScorer::new(config, None)
    }

    fn input<'a>(ua: Option<&'a str>, referer: Option<&'a str>, domain: Option<&'a str>) -> IvtInput<'a> {
        IvtInput {
            ua,
            referer,
            request_domain: domain,
            ip: None,
        }
    }

    #[test]
    fn test_clean_request_scores_zero() {
        let scorer = scorer(IvtConfig::default());
        let verdict = scorer.score(&input(
            Some("Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36"),
            Some("https://news.example.com/article"),
            Some("news.example.com"),
        ));

        assert_eq!(verdict.score, 0);
        assert!(!verdict.flagged);
    }

    #[test]
    fn test_empty_ua_scores_35() {
        let scorer = scorer(IvtConfig::default());
        let verdict = scorer.score(&input(Some(""), None, None));

        assert_eq!(verdict.score, SCORE_EMPTY_UA);
        assert!(verdict.reasons.contains(&"empty_ua"));
    }

    #[test]
    fn test_bot_ua_scores_50() {
        let scorer = scorer(IvtConfig::default());
        let verdict = scorer.score(&input(Some("Googlebot/2.1"), None, None));

        assert_eq!(verdict.score, SCORE_UA_PATTERN);
        assert!(verdict.reasons.contains(&"ua_pattern"));
    }

    #[test]
    fn test_referer_mismatch_plus_bot_flags() {
        let scorer = scorer(IvtConfig::default());
        let verdict = scorer.score(&input(
            Some("curl/8.0"),
            Some("https://unrelated.example.org/x"),
            Some("news.example.com"),
        ));

        assert_eq!(verdict.score, SCORE_UA_PATTERN + SCORE_REFERER_MISMATCH);
        assert!(verdict.flagged);
        // Blocking is off by default
        assert!(!verdict.blocked);
    }

    #[test]
    fn test_blocking_requires_opt_in() {
        let scorer = scorer(IvtConfig {
            blocking_enabled: true,
            ..Default::default()
        });

        let verdict = scorer.score(&input(
            Some("curl/8.0"),
            Some("https://unrelated.example.org/x"),
            Some("news.example.com"),
        ));

        assert!(verdict.blocked);
    }

    #[test]
    fn test_score_capped_at_100() {
        let scorer = scorer(IvtConfig {
            require_referer: true,
            ..Default::default()
        });

        let verdict = scorer.score(&input(Some("headless chrome scraper bot"), None, None));
        assert!(verdict.score <= SCORE_CAP);
    }

    #[test]
    fn test_subdomain_referer_accepted() {
        let scorer = scorer(IvtConfig::default());
        let verdict = scorer.score(&input(
            Some("Mozilla/5.0"),
            Some("https://m.news.example.com/page?x=1"),
            Some("news.example.com"),
        ));

        assert_eq!(verdict.score, 0);
    }

    #[test]
    fn test_monitoring_disabled_short_circuits() {
        let scorer = scorer(IvtConfig {
            monitoring_enabled: false,
            ..Default::default()
        });

        let verdict = scorer.score(&input(Some("curl/8.0"), None, None));
        assert_eq!(verdict.score, 0);
    }

    #[test]
    fn test_pattern_update_takes_effect() {
        let scorer = scorer(IvtConfig::default());
        assert_eq!(
            scorer.score(&input(Some("my-custom-agent"), None, None)).score,
            0
        );

        scorer.update_config(IvtConfig {
            ua_patterns: vec!["my-custom".to_string()],
            ..Default::default()
        });

        assert_eq!(
            scorer.score(&input(Some("my-custom-agent"), None, None)).score,
            SCORE_UA_PATTERN
        );
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://News.Example.com:8443/a/b?c=d").as_deref(),
            Some("news.example.com")
        );
        assert_eq!(
            extract_domain("news.example.com/path").as_deref(),
            Some("news.example.com")
        );
        assert_eq!(extract_domain(""), None);
    }
}
