//! Meeting-URL recognition shared by the CLI and provider implementations.

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::provider::MeetingRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeetingPlatform {
    Meet,
    Teams,
    Zoom,
}

impl MeetingPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meet => "Meet",
            Self::Teams => "Teams",
            Self::Zoom => "Zoom",
        }
    }
}

impl fmt::Display for MeetingPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identify the conferencing platform from the URL host. Accepts a bare link
/// or a block of join text; the first token with a known host wins.
pub fn detect_platform(url: &str) -> Result<MeetingPlatform> {
    url.split_whitespace()
        .find_map(|token| platform_for_host(&host_of(&clean_url(token))))
        .ok_or_else(|| anyhow!("Unsupported meeting provider: {}", url.trim()))
}

fn host_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn platform_for_host(host: &str) -> Option<MeetingPlatform> {
    if host == "meet.google.com" {
        Some(MeetingPlatform::Meet)
    } else if host.starts_with("teams.") || host.ends_with(".teams.microsoft.com") {
        Some(MeetingPlatform::Teams)
    } else if host == "zoom.us" || host.ends_with(".zoom.us") {
        Some(MeetingPlatform::Zoom)
    } else {
        None
    }
}

/// Strip surrounding whitespace and quotes, and add a scheme to bare `meet.` links.
fn clean_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);

    if unquoted.starts_with("meet.") {
        format!("https://{}", unquoted)
    } else {
        unquoted.to_string()
    }
}

/// Extracts the canonical link from Google Meet join information.
pub struct MeetUrlParser {
    code_regex: Regex,
}

impl MeetUrlParser {
    pub fn new() -> Result<Self> {
        // Meeting codes look like abc-defg-hij, optionally followed by a query string
        let code_regex = Regex::new(r"meet\.google\.com/([a-z]{3}-[a-z]{4}-[a-z]{3})((?:\?.*)?$)")?;

        Ok(Self { code_regex })
    }

    /// Accepts a bare link or a block of join text containing one.
    pub fn parse(&self, raw: &str) -> Result<MeetingRef> {
        let cleaned = clean_url(raw);

        let Some(candidate) = cleaned
            .split_whitespace()
            .find(|part| part.contains("meet.google.com"))
        else {
            bail!("No Google Meet URL found");
        };

        let Some(captures) = self.code_regex.captures(candidate) else {
            bail!("Invalid Google Meet URL format: {}", candidate);
        };

        let code = &captures[1];
        let query = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        let link = format!("https://meet.google.com/{}{}", code, query);
        debug!("Parsed Meet code {} from {:?}", code, raw);

        Ok(MeetingRef {
            meeting_id: link,
            password: None,
        })
    }
}

/// One-shot form of [`MeetUrlParser::parse`].
pub fn parse_meet_url(raw: &str) -> Result<MeetingRef> {
    MeetUrlParser::new()?.parse(raw)
}
