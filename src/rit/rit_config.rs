use std::env;

use anyhow::{Context, Result, anyhow};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:9999/v1";

#[derive(Clone)]
pub struct RitConfig {
    pub api_key: String,
    /// Always ends with `/` so endpoint paths join beneath it.
    pub base_url: Url,
}

impl RitConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("RIT_API_KEY").map_err(|_| anyhow!("RIT_API_KEY not set"))?;
        let base_url = env::var("RIT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(api_key, &base_url)
    }

    pub fn new(api_key: String, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("RIT API key must not be empty");
        }

        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let base_url =
            Url::parse(&normalized).with_context(|| format!("invalid RIT base url {base_url}"))?;

        Ok(Self { api_key, base_url })
    }
}

impl std::fmt::Debug for RitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RitConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = RitConfig::new("KEY".to_string(), "http://localhost:9999/v1").expect("valid");

        assert_eq!(
            config.base_url.join("case").expect("joins").as_str(),
            "http://localhost:9999/v1/case"
        );
    }

    #[test]
    fn rejects_empty_key_and_bad_url() {
        assert!(RitConfig::new(" ".to_string(), DEFAULT_BASE_URL).is_err());
        assert!(RitConfig::new("KEY".to_string(), "not a url").is_err());
    }
}
