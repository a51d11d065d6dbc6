// Results-page scraper: pulls `ytInitialData` out of the HTML and walks its video renderers.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{thumbnail_url, watch_url, SearchBackend, SearchItem};
use crate::config::UPSTREAM_HTTP_TIMEOUT;

pub const RESULTS_URL: &str = "https://www.youtube.com/results";

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub struct WebSearch {
    client: Client,
    results_url: String,
}

impl WebSearch {
    pub fn new(client: Client) -> Self {
        Self::with_results_url(client, RESULTS_URL.to_string())
    }

    /// Point the scraper at a different results endpoint.
    pub fn with_results_url(client: Client, results_url: String) -> Self {
        Self {
            client,
            results_url,
        }
    }
}

#[async_trait]
impl SearchBackend for WebSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchItem>> {
        let resp = self
            .client
            .get(&self.results_url)
            .query(&[("search_query", query), ("hl", "en")])
            .header("User-Agent", DESKTOP_USER_AGENT)
            .header("Accept-Language", "en-US,en;q=0.9")
            .timeout(UPSTREAM_HTTP_TIMEOUT)
            .send()
            .await
            .context("fetch results page")?;

        let status = resp.status();
        if !status.is_success() {
            warn!("results page status={}", status.as_u16());
            return Err(anyhow!("results page failed: HTTP {}", status.as_u16()));
        }

        let html = resp.text().await.context("read results page")?;
        let data = extract_initial_data(&html)?;
        let items = parse_results(&data, limit);
        debug!("web search {:?} -> {} items", query, items.len());
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "web"
    }
}

/// Locate the `ytInitialData` object embedded in the page.
pub fn extract_initial_data(html: &str) -> Result<Value> {
    let marker = html
        .find("ytInitialData")
        .ok_or_else(|| anyhow!("ytInitialData not found in results page"))?;
    let start = html[marker..]
        .find('{')
        .map(|i| marker + i)
        .ok_or_else(|| anyhow!("ytInitialData has no object"))?;

    // The streaming deserializer stops after one value, ignoring the trailing script.
    let mut values = serde_json::Deserializer::from_str(&html[start..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(anyhow!("malformed ytInitialData: {}", e)),
        None => Err(anyhow!("ytInitialData is empty")),
    }
}

/// Collect up to `limit` complete video results in page order.
pub fn parse_results(data: &Value, limit: usize) -> Vec<SearchItem> {
    let mut renderers = Vec::new();
    collect_video_renderers(data, &mut renderers);
    renderers
        .into_iter()
        .filter_map(item_from_renderer)
        .filter(SearchItem::is_complete)
        .take(limit)
        .collect()
}

fn collect_video_renderers<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "videoRenderer" {
                    out.push(child);
                } else {
                    collect_video_renderers(child, out);
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_video_renderers(child, out);
            }
        }
        _ => {}
    }
}

fn text_of(value: &Value) -> Option<String> {
    if let Some(s) = value["simpleText"].as_str() {
        return Some(s.to_string());
    }
    let runs = value["runs"].as_array()?;
    let joined: String = runs.iter().filter_map(|r| r["text"].as_str()).collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn item_from_renderer(renderer: &Value) -> Option<SearchItem> {
    let video_id = renderer["videoId"].as_str()?;
    let title = text_of(&renderer["title"])?;
    let author = text_of(&renderer["ownerText"])
        .or_else(|| text_of(&renderer["longBylineText"]))
        .or_else(|| text_of(&renderer["shortBylineText"]))
        .unwrap_or_default();
    let duration = text_of(&renderer["lengthText"]).unwrap_or_default();

    Some(SearchItem {
        title,
        thumbnail: thumbnail_url(video_id),
        url: watch_url(video_id),
        duration,
        author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer(id: &str, title: &str, length: Option<&str>) -> Value {
        let mut r = json!({
            "videoId": id,
            "title": { "runs": [{ "text": title }] },
            "ownerText": { "runs": [{ "text": "Some Channel" }] },
        });
        if let Some(length) = length {
            r["lengthText"] = json!({ "simpleText": length });
        }
        json!({ "videoRenderer": r })
    }

    #[test]
    fn test_extract_initial_data_ignores_trailing_script() {
        let html = r#"<script>var ytInitialData = {"a": {"b": "}"}};</script><script>var x = {};</script>"#;
        let data = extract_initial_data(html).unwrap();
        assert_eq!(data["a"]["b"], "}");
    }

    #[test]
    fn test_extract_initial_data_missing() {
        assert!(extract_initial_data("<html></html>").is_err());
    }

    #[test]
    fn test_parse_results_walks_nested_sections() {
        let data = json!({
            "contents": { "sectionListRenderer": { "contents": [
                { "itemSectionRenderer": { "contents": [
                    renderer("aaaaaaaaaaa", "First", Some("3:45")),
                    { "adSlotRenderer": {} },
                    renderer("bbbbbbbbbbb", "Live now", None),
                ]}},
                { "itemSectionRenderer": { "contents": [
                    { "shelfRenderer": { "content": { "items": [
                        renderer("ccccccccccc", "Nested", Some("1:02:03")),
                    ]}}},
                ]}},
            ]}}
        });

        let items = parse_results(&data, 10);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "First");
        assert_eq!(items[0].url, "https://youtube.com/watch?v=aaaaaaaaaaa");
        assert_eq!(
            items[0].thumbnail,
            "https://i.ytimg.com/vi/aaaaaaaaaaa/hqdefault.jpg"
        );
        assert_eq!(items[0].duration, "3:45");
        assert_eq!(items[0].author, "Some Channel");
        assert_eq!(items[1].duration, "");
        assert_eq!(items[2].duration, "1:02:03");
    }

    #[test]
    fn test_parse_results_limits_and_skips_incomplete() {
        let mut contents: Vec<Value> = (0..15)
            .map(|i| renderer(&format!("id{:09}", i), &format!("Video {}", i), Some("1:00")))
            .collect();
        contents.insert(0, json!({ "videoRenderer": { "videoId": "untitled000" } }));
        let data = json!({ "contents": contents });

        let items = parse_results(&data, 10);
        assert_eq!(items.len(), 10);
        assert_eq!(items[0].title, "Video 0");
        assert!(items.iter().all(SearchItem::is_complete));
    }
}
