//! Attack-signature shield.
//!
//! Path and query are percent-decoded (with `+` read as a space in the query)
//! and matched against a [`RegexSet`]. The raw form is checked as well so
//! that double-encoded payloads which fail to decode still hit a signature.

use regex::RegexSet;

use crate::request::RequestFacts;

const SIGNATURES: &[(&str, &str)] = &[
    ("path_traversal", r"(?i)(?:^|[/\\=])\.\.(?:[/\\]|$)|%2e%2e"),
    (
        "sql_injection",
        r"(?i)\bunion\s+(?:all\s+)?select\b|'\s*or\s+'?\d+'?\s*=\s*'?\d+|;\s*drop\s+table\b|\bsleep\s*\(\s*\d+\s*\)|\binformation_schema\b",
    ),
    (
        "script_injection",
        r"(?i)<\s*script\b|javascript\s*:|\bon(?:error|load)\s*=",
    ),
    (
        "shell_injection",
        r"(?:;|\||&&|`|\$\()\s*(?:cat|curl|wget|sh|bash|nc|rm|id|uname)\b",
    ),
    (
        "scanner_probe",
        r"(?i)^/(?:\.env\b|\.git(?:/|$)|wp-admin\b|wp-login\.php|phpmyadmin\b|cgi-bin/|xmlrpc\.php)",
    ),
];

/// Compiled signature set.
#[derive(Debug, Clone)]
pub struct Shield {
    set: RegexSet,
}

impl Shield {
    /// Compile the built-in signatures.
    pub fn new() -> Result<Self, regex::Error> {
        let set = RegexSet::new(SIGNATURES.iter().map(|(_, pattern)| *pattern))?;
        Ok(Self { set })
    }

    /// Name of the first signature the request matches, if any.
    pub fn inspect(&self, facts: &RequestFacts) -> Option<&'static str> {
        let raw = match &facts.query {
            Some(query) => format!("{}?{query}", facts.path),
            None => facts.path.clone(),
        };
        let decoded = decode(&facts.path, facts.query.as_deref());

        [decoded.as_str(), raw.as_str()]
            .into_iter()
            .find_map(|target| self.set.matches(target).into_iter().next())
            .map(|index| SIGNATURES[index].0)
    }
}

fn decode(path: &str, query: Option<&str>) -> String {
    let path = urlencoding::decode(path).map_or_else(|_| path.to_string(), |p| p.into_owned());
    match query {
        Some(query) => {
            let spaced = query.replace('+', " ");
            let query = urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), |q| q.into_owned());
            format!("{path}?{query}")
        }
        None => path,
    }
}
