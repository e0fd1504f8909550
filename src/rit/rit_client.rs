use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

use crate::rit::rit_config::RitConfig;
use crate::rit::rit_models::{
    AssetResponse, BookResponse, CaseResponse, ErrorBody, HistoryBar, LeaseResponse,
    OrderResponse, RateLimitBody, SecurityResponse,
};
use crate::venue::venue_error::{VenueError, VenueResult};

const API_KEY_HEADER: &str = "X-API-Key";

type Query = Vec<(&'static str, String)>;

#[derive(Clone, Debug)]
pub struct RitClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RitClient {
    pub fn new(config: RitConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&config.api_key)
                .map_err(|_| anyhow::anyhow!("invalid API key header value"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    pub async fn case(&self) -> VenueResult<CaseResponse> {
        self.get("case", Vec::new()).await
    }

    pub async fn history(&self, ticker: &str, limit: u32) -> VenueResult<Vec<HistoryBar>> {
        self.get(
            "securities/history",
            vec![("ticker", ticker.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn book(&self, ticker: &str, limit: u32) -> VenueResult<BookResponse> {
        self.get(
            "securities/book",
            vec![("ticker", ticker.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    pub async fn securities(&self, ticker: &str) -> VenueResult<Vec<SecurityResponse>> {
        self.get("securities", vec![("ticker", ticker.to_string())])
            .await
    }

    pub async fn orders(&self, status: &str) -> VenueResult<Vec<OrderResponse>> {
        self.get("orders", vec![("status", status.to_string())]).await
    }

    pub async fn post_order(&self, params: Query) -> VenueResult<OrderResponse> {
        let text = self.send(Method::POST, "orders", params).await?;
        decode("orders", &text)
    }

    pub async fn bulk_cancel(&self, params: Query) -> VenueResult<()> {
        self.send(Method::POST, "commands/cancel", params).await?;
        Ok(())
    }

    pub async fn leases(&self) -> VenueResult<Vec<LeaseResponse>> {
        self.get("leases", Vec::new()).await
    }

    /// The venue echoes the new lease for storage and refinery rentals but not
    /// always for lease-and-use pipeline calls.
    pub async fn post_lease(&self, params: Query) -> VenueResult<Option<LeaseResponse>> {
        let text = self.send(Method::POST, "leases", params).await?;

        Ok(serde_json::from_str::<LeaseResponse>(&text).ok())
    }

    pub async fn use_lease(&self, id: u64, params: Query) -> VenueResult<()> {
        self.send(Method::POST, &format!("leases/{id}"), params)
            .await?;
        Ok(())
    }

    pub async fn delete_lease(&self, id: u64) -> VenueResult<()> {
        self.send(Method::DELETE, &format!("leases/{id}"), Vec::new())
            .await?;
        Ok(())
    }

    pub async fn assets(&self) -> VenueResult<Vec<AssetResponse>> {
        self.get("assets", Vec::new()).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: Query) -> VenueResult<T> {
        let text = self.send(Method::GET, path, query).await?;
        decode(path, &text)
    }

    async fn send(&self, method: Method, path: &str, query: Query) -> VenueResult<String> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| VenueError::malformed(path, format!("bad endpoint path: {e}")))?;

        let response = self
            .http
            .request(method, url)
            .query(&query)
            .send()
            .await
            .map_err(|source| VenueError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|source| VenueError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        classify(path, status, text)
    }
}

fn classify(endpoint: &str, status: u16, text: String) -> VenueResult<String> {
    match status {
        200..=299 => Ok(text),
        401 => Err(VenueError::Auth {
            endpoint: endpoint.to_string(),
        }),
        429 => {
            let wait = serde_json::from_str::<RateLimitBody>(&text)
                .map(|body| Duration::from_secs_f64(body.wait.clamp(0.0, 60.0)))
                .unwrap_or(Duration::from_secs(1));

            Err(VenueError::RateLimited {
                endpoint: endpoint.to_string(),
                wait,
            })
        }
        500..=599 => Err(VenueError::Server {
            endpoint: endpoint.to_string(),
            status,
        }),
        _ => {
            let message = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(ErrorBody {
                    code: Some(code),
                    message: Some(message),
                }) => format!("{code}: {message}"),
                Ok(ErrorBody {
                    message: Some(message),
                    ..
                }) => message,
                _ => text,
            };

            Err(VenueError::Rejected {
                endpoint: endpoint.to_string(),
                status,
                message,
            })
        }
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, text: &str) -> VenueResult<T> {
    serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, %text, endpoint, "failed to parse venue JSON response");
        VenueError::malformed(endpoint, e.to_string())
    })
}
