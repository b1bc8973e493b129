//! Best-effort query translation
//!
//! Rewrites the search term into a country's primary language via the
//! public translate endpoint. Callers treat any error as "keep the original
//! query"; translation never blocks a run.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, ScraperError};
use crate::traits::Translator;

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Primary language per ISO-2 country code. Countries not listed keep the
/// original query.
fn target_language(country_code: &str) -> Option<&'static str> {
    let lang = match country_code {
        "DE" | "AT" => "de",
        "FR" => "fr",
        "ES" | "MX" | "AR" | "CL" | "CO" | "PE" => "es",
        "IT" => "it",
        "PT" | "BR" => "pt",
        "NL" => "nl",
        "PL" => "pl",
        "RU" => "ru",
        "TR" => "tr",
        "GR" => "el",
        "MK" => "mk",
        "RS" => "sr",
        "BG" => "bg",
        "RO" => "ro",
        "HU" => "hu",
        "CZ" => "cs",
        "SK" => "sk",
        "SI" => "sl",
        "HR" => "hr",
        "AL" => "sq",
        "SE" => "sv",
        "NO" => "no",
        "DK" => "da",
        "FI" => "fi",
        "JP" => "ja",
        "KR" => "ko",
        "CN" | "TW" => "zh-CN",
        "SA" | "AE" | "EG" => "ar",
        "IL" => "iw",
        "TH" => "th",
        "VN" => "vi",
        "ID" => "id",
        "UA" => "uk",
        _ => return None,
    };
    Some(lang)
}

pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            endpoint: ENDPOINT.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, query: &str, country_code: &str) -> Result<String> {
        let Some(lang) = target_language(&country_code.to_uppercase()) else {
            // No mapping for this country; keep the original query.
            return Ok(query.to_string());
        };

        let url = format!(
            "{}?client=gtx&sl=auto&tl={}&dt=t&q={}",
            self.endpoint,
            lang,
            urlencoding::encode(query)
        );
        let payload: Value = self.client.get(&url).send().await?.json().await?;

        // Response shape: [[[translated, original, ...], ...], ...]
        let translated = payload
            .get(0)
            .and_then(|v| v.get(0))
            .and_then(|v| v.get(0))
            .and_then(Value::as_str)
            .ok_or_else(|| ScraperError::Translation {
                message: "unexpected response shape".to_string(),
            })?;

        debug!("Translated '{}' to '{}' ({})", query, translated, lang);
        Ok(translated.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_countries_have_no_target_language() {
        assert_eq!(target_language("US"), None);
        assert_eq!(target_language("GB"), None);
        assert_eq!(target_language("DE"), Some("de"));
        assert_eq!(target_language("MK"), Some("mk"));
    }

    #[test]
    fn response_shape_extraction() {
        let payload: Value =
            serde_json::from_str(r#"[[["Zahnarzt","dentist",null,null,10]],null,"en"]"#).unwrap();
        let translated = payload
            .get(0)
            .and_then(|v| v.get(0))
            .and_then(|v| v.get(0))
            .and_then(Value::as_str)
            .unwrap();
        assert_eq!(translated, "Zahnarzt");
    }
}
