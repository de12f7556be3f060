#![allow(dead_code)]

use axum::{
    body::Bytes,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use rss_aggregator::{FetchConfig, Fetcher, Source, SourceRegistry};
use std::net::SocketAddr;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

/// One item of a generated RSS document.
#[derive(Debug, Clone, Default)]
pub struct Item {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub extra: String,
}

impl Item {
    pub fn new(title: &str, link: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            description: Some(format!("Summary of {}", title)),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn pub_date(mut self, pub_date: &str) -> Self {
        self.pub_date = Some(pub_date.to_string());
        self
    }

    pub fn extra(mut self, xml: &str) -> Self {
        self.extra.push_str(xml);
        self
    }
}

/// Re-encodes an all-Latin-1 document as ISO-8859-1 bytes.
pub fn latin1(xml: &str) -> Vec<u8> {
    xml.replace(r#"encoding="UTF-8""#, r#"encoding="ISO-8859-1""#)
        .chars()
        .map(|c| u8::try_from(u32::from(c)).expect("latin-1 character"))
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn rss(items: &[Item]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
<title>Test Feed</title>
<link>https://example.com/</link>
<description>Test feed</description>
"#,
    );

    for item in items {
        xml.push_str("<item>\n");
        if let Some(title) = &item.title {
            xml.push_str(&format!("<title>{}</title>\n", escape(title)));
        }
        if let Some(link) = &item.link {
            xml.push_str(&format!("<link>{}</link>\n", escape(link)));
        }
        if let Some(description) = &item.description {
            xml.push_str(&format!("<description>{}</description>\n", escape(description)));
        }
        if let Some(pub_date) = &item.pub_date {
            xml.push_str(&format!("<pubDate>{}</pubDate>\n", pub_date));
        }
        xml.push_str(&item.extra);
        xml.push_str("</item>\n");
    }

    xml.push_str("</channel>\n</rss>\n");
    xml
}

/// `count` items numbered from 1, newest first, with links under `prefix`.
pub fn numbered_items(prefix: &str, count: usize) -> Vec<Item> {
    (1..=count)
        .map(|i| {
            Item::new(&format!("Story {} from {}", i, prefix), &format!("https://{}.example.com/story-{}", prefix, i))
                .pub_date(&format!("Mon, 01 Jan 2024 {:02}:00:00 GMT", 23 - i.min(23)))
        })
        .collect()
}

/// No charset parameter: the XML declaration is the only encoding hint.
fn xml_response(body: impl Into<Bytes>) -> impl IntoResponse {
    let body: Bytes = body.into();
    ([(header::CONTENT_TYPE, "application/rss+xml")], body)
}

/// Serves fixed feeds on an ephemeral local port:
///
/// - `/feed/{name}` for each `(name, body)` pair
/// - `/error` answers 500
/// - `/browser-only` answers 403 unless the User-Agent looks like a browser
pub async fn spawn_feed_server<B: Into<Bytes>>(feeds: Vec<(&str, B)>) -> SocketAddr {
    let mut app = Router::new()
        .route(
            "/error",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        )
        .route(
            "/browser-only",
            get(|headers: HeaderMap| async move {
                let user_agent = headers
                    .get(header::USER_AGENT)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default();
                if user_agent.starts_with("Mozilla/5.0") {
                    xml_response(rss(&[Item::new("Browser story", "https://example.com/browser")]))
                        .into_response()
                } else {
                    StatusCode::FORBIDDEN.into_response()
                }
            }),
        );

    for (name, body) in feeds {
        let body: Bytes = body.into();
        let path = format!("/feed/{}", name);
        app = app.route(
            &path,
            get(move || {
                let body = body.clone();
                async move { xml_response(body) }
            }),
        );
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind feed server");
    let addr = listener.local_addr().expect("feed server address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("feed server");
    });
    addr
}

pub fn feed_url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

pub fn source(key: &str, url: String) -> Source {
    Source::new(key, url, format!("{} News", key), "technology", "#123456")
}

pub fn registry(sources: Vec<Source>) -> SourceRegistry {
    SourceRegistry::new(sources).expect("valid test registry")
}

pub fn test_fetcher() -> Fetcher {
    Fetcher::new(FetchConfig {
        timeout_seconds: 5,
        ..FetchConfig::default()
    })
    .expect("fetcher")
}
