use super::Source;

const TECHNOLOGY: &str = "technology";

/// (key, feed url, display name, display color)
const TECH_FEEDS: [(&str, &str, &str, &str); 5] = [
    ("techcrunch", "https://techcrunch.com/feed/", "TechCrunch", "#00D084"),
    ("theverge", "https://www.theverge.com/rss/index.xml", "The Verge", "#FF6600"),
    ("arstechnica", "https://feeds.arstechnica.com/arstechnica/index", "Ars Technica", "#FF4500"),
    ("wired", "https://www.wired.com/feed/rss", "Wired", "#000000"),
    ("hackernews", "https://hnrss.org/frontpage", "Hacker News", "#FF6600"),
];

pub fn builtin_sources() -> Vec<Source> {
    TECH_FEEDS
        .iter()
        .map(|(key, url, name, color)| Source::new(*key, *url, *name, TECHNOLOGY, *color))
        .collect()
}
