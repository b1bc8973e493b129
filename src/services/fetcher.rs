//! HTTP business fetcher against the maps search page
//!
//! Fetches the server-rendered search page and mines business entries out of
//! the embedded app-initialization payload. The payload layout is unstable
//! across rollouts, so extraction is heuristic: an entry is any array that
//! carries a place id, and its fields are classified by shape. When the
//! payload yields nothing, listing anchors in the HTML are used as a thin
//! fallback.
//!
//! Orchestration never depends on these internals; this module only has to
//! honor the [`BusinessFetcher`] contract of "finite list or error".

use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ScraperError};
use crate::traits::BusinessFetcher;
use crate::types::BusinessRecord;

const SEARCH_BASE: &str = "https://www.google.com/maps/search";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PAYLOAD_MARKER: &str = "window.APP_INITIALIZATION_STATE=";

pub struct MapsFetcher {
    client: Client,
}

impl MapsFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl BusinessFetcher for MapsFetcher {
    async fn fetch(&self, query: &str, country_code: &str) -> Result<Vec<BusinessRecord>> {
        let url = format!(
            "{}/{}?hl=en&gl={}",
            SEARCH_BASE,
            urlencoding::encode(query),
            country_code.to_lowercase()
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ScraperError::fetch(
                query,
                format!("search page returned {}", response.status()),
            ));
        }
        let html = response.text().await?;

        let mut records = match extract_payload(&html) {
            Some(payload) => mine_places(&payload),
            None => Vec::new(),
        };
        if records.is_empty() {
            records = parse_listing_anchors(&html);
        }

        debug!("Fetched {} raw records for '{}'", records.len(), query);
        Ok(records)
    }
}

/// Slice the app-initialization blob out of the page and parse it.
fn extract_payload(html: &str) -> Option<Value> {
    let start = html.find(PAYLOAD_MARKER)? + PAYLOAD_MARKER.len();
    let rest = &html[start..];
    let end = rest.find(";window.")?;
    serde_json::from_str(&rest[..end]).ok()
}

/// Walk the payload and collect every array that looks like a place entry.
fn mine_places(payload: &Value) -> Vec<BusinessRecord> {
    let mut records = Vec::new();
    walk(payload, &mut records);
    records
}

fn walk(value: &Value, out: &mut Vec<BusinessRecord>) {
    if let Value::Array(items) = value {
        if let Some(record) = classify_place_array(items) {
            out.push(record);
        }
        for item in items {
            walk(item, out);
        }
    }
}

/// Interpret an array holding a place id as one business entry, classifying
/// its sibling strings by shape.
fn classify_place_array(items: &[Value]) -> Option<BusinessRecord> {
    let strings: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
    let source_id = strings.iter().copied().find(|s| is_place_id(s))?;

    let mut record = BusinessRecord {
        source_id: Some(source_id.to_string()),
        ..Default::default()
    };

    for s in strings {
        if s == source_id || s.starts_with("http") {
            if s.starts_with("http") && record.website.is_none() {
                record.website = Some(s.to_string());
            }
            continue;
        }
        if looks_like_phone(s) && record.phone_number.is_none() {
            record.phone_number = Some(s.to_string());
        } else if looks_like_address(s) && record.formatted_address.is_none() {
            record.formatted_address = Some(s.to_string());
        } else if record.name.is_empty() {
            record.name = s.to_string();
        } else if record.category.is_none() {
            record.category = Some(s.to_string());
        }
    }

    if record.name.is_empty() {
        None
    } else {
        Some(record)
    }
}

/// Place ids look like `0x<hex>:0x<hex>`.
fn is_place_id(s: &str) -> bool {
    let mut parts = s.splitn(2, ':');
    let (Some(left), Some(right)) = (parts.next(), parts.next()) else {
        return false;
    };
    let is_hex = |p: &str| {
        p.len() > 2 && p.starts_with("0x") && p[2..].chars().all(|c| c.is_ascii_hexdigit())
    };
    is_hex(left) && is_hex(right)
}

/// Phone-ish: mostly digits with separators, at least seven digits.
fn looks_like_phone(s: &str) -> bool {
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= 7
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

/// Address-ish: contains a comma and at least one digit.
fn looks_like_address(s: &str) -> bool {
    s.contains(',') && s.chars().any(|c| c.is_ascii_digit())
}

/// Fallback: pull names off `/maps/place/` anchors in the rendered HTML.
fn parse_listing_anchors(html: &str) -> Vec<BusinessRecord> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(r#"a[href*="/maps/place/"]"#) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut records = Vec::new();
    for element in document.select(&selector) {
        let name = element
            .value()
            .attr("aria-label")
            .map(str::to_string)
            .unwrap_or_else(|| element.text().collect::<String>().trim().to_string());
        if !name.is_empty() {
            records.push(BusinessRecord {
                name,
                ..Default::default()
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_id_shape_is_recognized() {
        assert!(is_place_id("0x1354a5b2c3d4e5f6:0x4bca9f8e7d6c5b4a"));
        assert!(!is_place_id("0x1354a5b2c3d4e5f6"));
        assert!(!is_place_id("not an id"));
        assert!(!is_place_id("0xZZ:0x12"));
    }

    #[test]
    fn phone_and_address_classifiers() {
        assert!(looks_like_phone("+389 2 3111 222"));
        assert!(looks_like_phone("(555) 010-0100"));
        assert!(!looks_like_phone("Bul. Partizanski 12"));
        assert!(looks_like_address("Bul. Partizanski 12, Skopje 1000"));
        assert!(!looks_like_address("Acme Dental"));
    }

    #[test]
    fn mines_place_entries_out_of_the_payload() {
        let html = concat!(
            "<html><script>window.APP_INITIALIZATION_STATE=",
            r#"[[1,["0x135f1e2a3b4c5d6e:0x4bc09f8e7d6c5b4a","Acme Dental","Bul. Partizanski 12, Skopje 1000","+389 2 3111 222","Dentist"]]]"#,
            ";window.APP_FLAGS=1;</script></html>"
        );

        let payload = extract_payload(html).unwrap();
        let records = mine_places(&payload);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Acme Dental");
        assert_eq!(
            record.formatted_address.as_deref(),
            Some("Bul. Partizanski 12, Skopje 1000")
        );
        assert_eq!(record.phone_number.as_deref(), Some("+389 2 3111 222"));
        assert_eq!(record.category.as_deref(), Some("Dentist"));
        assert!(record.source_id.as_deref().unwrap().starts_with("0x"));
    }

    #[test]
    fn missing_payload_yields_nothing() {
        assert!(extract_payload("<html>no state here</html>").is_none());
    }

    #[test]
    fn anchor_fallback_extracts_names() {
        let html = r#"<html><body>
            <a href="/maps/place/Acme+Dental" aria-label="Acme Dental">link</a>
            <a href="/other">ignored</a>
        </body></html>"#;
        let records = parse_listing_anchors(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Acme Dental");
    }
}
