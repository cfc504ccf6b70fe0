mod input;
mod output;

use std::{fmt, time::Duration};

use config::{CredentialLocation, UpstreamConfig};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

pub(crate) use self::input::{GeminiGenerationConfig, GeminiSafetySetting, GenerateRequest};
use self::output::{ErrorResponse, GenerateResponse};

use crate::{
    error::{ErrorKind, TransformError},
    provider::{API_KEY_QUERY_PARAMETER, EndpointCandidates, redact_url},
};

/// Header carrying the API key when it is not sent as a query parameter.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Text sent to every endpoint when probing.
const PROBE_TEXT: &str = "Hello";

/// What a single upstream attempt resulted in, when it did not fail terminally.
#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    Generated(String),
    RateLimited,
    NotFound,
}

/// Client of the Gemini `generateContent` method with retry and endpoint fallback.
pub(crate) struct GeminiClient {
    client: Client,
    endpoints: EndpointCandidates,
    credential_location: CredentialLocation,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl GeminiClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.endpoints.is_empty(), "No upstream endpoints configured");

        let client = Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client for the upstream: {e}"))?;

        Ok(Self {
            client,
            endpoints: EndpointCandidates::new(config.endpoints.clone()),
            credential_location: config.credential_location,
            timeout: config.timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Generate text for `request`, returning the trimmed text of the first candidate.
    ///
    /// A 429 is retried on the same endpoint after `retry_delay * n` for the n-th
    /// retry, up to `max_retries` times. A 404 moves on to the next endpoint, and an
    /// endpoint that answers after such a move becomes the starting point of later
    /// calls. Every other failure ends the call.
    pub async fn send(&self, request: &GenerateRequest, api_key: &SecretString) -> crate::Result<String> {
        let start = self.endpoints.current();
        let mut not_found = 0;
        let mut retries = 0;

        loop {
            let (index, endpoint) = self.endpoints.nth_from(start, not_found);

            match self.attempt(endpoint, request, api_key).await? {
                Attempt::Generated(text) => {
                    if not_found > 0 {
                        self.endpoints.promote(index);
                    }

                    log::debug!(
                        "Upstream {} generated {} characters",
                        redact_url(endpoint),
                        text.chars().count()
                    );

                    return Ok(text);
                }
                Attempt::RateLimited if retries < self.max_retries => {
                    retries += 1;
                    let delay = backoff(self.retry_delay, retries);

                    log::warn!(
                        "Upstream {} is rate limiting, retry {retries}/{} in {delay:?}",
                        redact_url(endpoint),
                        self.max_retries
                    );

                    tokio::time::sleep(delay).await;
                }
                Attempt::RateLimited => {
                    return Err(TransformError::new(ErrorKind::RateLimited)
                        .with_detail(format!("Upstream still rate limiting after {retries} retries")));
                }
                Attempt::NotFound => {
                    not_found += 1;

                    if not_found == self.endpoints.len() {
                        return Err(TransformError::new(ErrorKind::EndpointNotFound)
                            .with_detail(format!("All {not_found} upstream endpoints answered 404")));
                    }

                    log::warn!("Upstream {} answered 404, trying the next endpoint", redact_url(endpoint));
                }
            }
        }
    }

    /// Send a minimal request to every endpoint, once, without retries.
    pub async fn probe(&self, api_key: &SecretString) -> Vec<EndpointProbe> {
        let request = GenerateRequest::text(PROBE_TEXT);
        let mut results = Vec::with_capacity(self.endpoints.len());

        for endpoint in self.endpoints.iter() {
            let result = match self.attempt(endpoint, &request, api_key).await {
                Ok(Attempt::Generated(text)) => Ok(text),
                Ok(Attempt::RateLimited) => Err(TransformError::new(ErrorKind::RateLimited)),
                Ok(Attempt::NotFound) => Err(TransformError::new(ErrorKind::EndpointNotFound)),
                Err(error) => Err(error),
            };

            results.push(EndpointProbe {
                endpoint: endpoint.clone(),
                result,
            });
        }

        results
    }

    async fn attempt(&self, endpoint: &Url, request: &GenerateRequest, api_key: &SecretString) -> crate::Result<Attempt> {
        let dispatch = self.dispatch(endpoint, request, api_key);

        let (status, body) = match tokio::time::timeout(self.timeout, dispatch).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return Err(network_error(endpoint, error)),
            Err(_) => {
                log::warn!(
                    "Upstream {} did not answer within {:?}",
                    redact_url(endpoint),
                    self.timeout
                );

                return Err(TransformError::new(ErrorKind::Timeout)
                    .with_detail(format!("No answer within {:?}", self.timeout)));
            }
        };

        classify(status, &body)
    }

    async fn dispatch(
        &self,
        endpoint: &Url,
        request: &GenerateRequest,
        api_key: &SecretString,
    ) -> Result<(StatusCode, String), reqwest::Error> {
        let mut url = endpoint.clone();

        if self.credential_location == CredentialLocation::Query {
            url.query_pairs_mut()
                .append_pair(API_KEY_QUERY_PARAMETER, api_key.expose_secret());
        }

        log::debug!("Sending generation request to {}", redact_url(&url));

        let mut builder = self.client.post(url).json(request);

        if self.credential_location == CredentialLocation::Header {
            builder = builder.header(API_KEY_HEADER, api_key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok((status, body))
    }
}

/// Result of probing a single endpoint.
#[derive(Debug)]
pub struct EndpointProbe {
    /// The probed endpoint.
    pub endpoint: Url,
    /// The generated text, or why the endpoint is unusable.
    pub result: Result<String, TransformError>,
}

impl fmt::Display for EndpointProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(_) => write!(f, "ok      {}", self.endpoint),
            Err(error) => match error.detail() {
                Some(detail) => write!(f, "failed  {} ({}: {detail})", self.endpoint, error.kind()),
                None => write!(f, "failed  {} ({})", self.endpoint, error.kind()),
            },
        }
    }
}

fn classify(status: StatusCode, body: &str) -> crate::Result<Attempt> {
    if status.is_success() {
        let response: GenerateResponse = sonic_rs::from_str(body).map_err(|e| {
            log::error!("Failed to parse upstream response: {e}");
            log::debug!("Raw upstream response: {body}");

            TransformError::new(ErrorKind::InvalidResponse).with_detail(e.to_string())
        })?;

        return response.into_text().map(Attempt::Generated).ok_or_else(|| {
            log::debug!("Upstream response without generated text: {body}");
            TransformError::new(ErrorKind::InvalidResponse).with_detail("No text in the first candidate")
        });
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Ok(Attempt::RateLimited),
        StatusCode::NOT_FOUND => Ok(Attempt::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            log::error!("Upstream rejected the credential ({status}): {body}");

            Err(TransformError::new(ErrorKind::ServerMisconfigured)
                .with_detail(format!("Upstream rejected the credential with status {}", status.as_u16())))
        }
        StatusCode::BAD_REQUEST if is_invalid_api_key(body) => {
            log::error!("Upstream reports an invalid API key: {body}");

            Err(TransformError::new(ErrorKind::ServerMisconfigured).with_detail("Upstream reports an invalid API key"))
        }
        _ => {
            log::error!("Upstream error ({status}): {body}");

            Err(TransformError::new(ErrorKind::UpstreamError).with_detail(status.as_u16().to_string()))
        }
    }
}

/// Delay before the `retry`-th retry, counting from one.
fn backoff(retry_delay: Duration, retry: u32) -> Duration {
    retry_delay.saturating_mul(retry)
}

fn is_invalid_api_key(body: &str) -> bool {
    sonic_rs::from_str::<ErrorResponse>(body)
        .map(|response| response.is_invalid_api_key())
        .unwrap_or(false)
}

fn network_error(endpoint: &Url, error: reqwest::Error) -> TransformError {
    let error = error.without_url();

    if error.is_timeout() {
        return TransformError::new(ErrorKind::Timeout).with_detail(error.to_string());
    }

    log::error!("Failed to reach upstream {}: {error}", redact_url(endpoint));

    TransformError::new(ErrorKind::NetworkError).with_detail(error.to_string())
}
