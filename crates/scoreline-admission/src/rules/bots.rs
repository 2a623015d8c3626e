//! User-agent classification.

use serde::Serialize;

/// What kind of client a user agent belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotCategory {
    /// Search engine crawler.
    SearchEngine,
    /// Link-preview fetcher (chat apps, social networks).
    Preview,
    /// Scripts, HTTP libraries, headless browsers, unnamed crawlers.
    Automated,
    /// Anything not recognized as a bot.
    Browser,
}

const SEARCH_ENGINES: &[&str] = &[
    "googlebot",
    "bingbot",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "applebot",
    "slurp",
];

const PREVIEWS: &[&str] = &[
    "facebookexternalhit",
    "twitterbot",
    "slackbot",
    "discordbot",
    "linkedinbot",
    "whatsapp",
    "telegrambot",
    "embedly",
];

const AUTOMATED: &[&str] = &[
    "curl/",
    "wget/",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "go-http-client",
    "java/",
    "okhttp",
    "libwww-perl",
    "scrapy",
    "httpclient",
    "headlesschrome",
    "phantomjs",
    "puppeteer",
    "selenium",
    "node-fetch",
    "axios/",
    "bot",
    "crawler",
    "spider",
];

/// Classify a user agent. Missing or blank agents count as automated.
pub fn classify(user_agent: Option<&str>) -> BotCategory {
    let Some(agent) = user_agent.map(str::trim).filter(|a| !a.is_empty()) else {
        return BotCategory::Automated;
    };
    let agent = agent.to_ascii_lowercase();
    let hit = |needles: &[&str]| needles.iter().any(|n| agent.contains(n));

    // Crawler names contain "bot", so the allowlists are checked first.
    if hit(SEARCH_ENGINES) {
        BotCategory::SearchEngine
    } else if hit(PREVIEWS) {
        BotCategory::Preview
    } else if hit(AUTOMATED) {
        BotCategory::Automated
    } else {
        BotCategory::Browser
    }
}
