use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("balcheck/", env!("CARGO_PKG_VERSION"));

/// Thin JSON-over-HTTP helper shared by every source. The timeout is the only
/// deadline in the system: it applies to each request, never to a whole run.
#[derive(Clone)]
pub struct JsonClient {
    http: Client,
}

impl JsonClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { http })
    }

    /// GET `url` and decode the body. Anything but 200 is an error.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.get_json_with_query(url, &[]).await
    }

    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let response = self.send(url, query).await?;
        match response.status() {
            StatusCode::OK => Self::decode(url, response).await,
            status => Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Like `get_json`, but a 404 yields `Ok(None)` instead of an error.
    pub async fn get_json_or_not_found<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, FetchError> {
        let response = self.send(url, &[]).await?;
        match response.status() {
            StatusCode::OK => Self::decode(url, response).await.map(Some),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, FetchError> {
        debug!(url = %url, "GET");

        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }

        request.send().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })
    }

    async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, FetchError> {
        let body = response.bytes().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
