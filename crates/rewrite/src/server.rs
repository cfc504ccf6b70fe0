use std::sync::Arc;

use config::Config;
use rate_limit::{ClientIdentity, RateLimitError, RateLimitManager};
use secrecy::SecretString;

use crate::{
    error::{ErrorKind, TransformError},
    prompt::RequestBuilder,
    provider::{gemini::GeminiClient, token},
    request::RequestContext,
};

#[derive(Clone)]
pub(crate) struct TransformServer {
    shared: Arc<TransformServerInner>,
}

struct TransformServerInner {
    rate_limits: RateLimitManager,
    builder: RequestBuilder,
    client: GeminiClient,
    api_key: Option<SecretString>,
    forward_key: bool,
}

impl TransformServer {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let rate_limits = RateLimitManager::new(config.server.rate_limits.clone());
        let builder = RequestBuilder::new(&config.transform, &config.upstream);
        let client = GeminiClient::new(&config.upstream)?;

        log::debug!(
            "Transform server initialized with {} upstream endpoint(s), rate limiting {}",
            config.upstream.endpoints.len(),
            if rate_limits.is_enabled() { "enabled" } else { "disabled" },
        );

        Ok(Self {
            shared: Arc::new(TransformServerInner {
                rate_limits,
                builder,
                client,
                api_key: config.upstream.configured_api_key().cloned(),
                forward_key: config.upstream.forward_key,
            }),
        })
    }

    /// Rewrite `text` on behalf of `identity`.
    ///
    /// The rate limit is checked first, so a rejected caller never reaches validation
    /// or the upstream. Requests failing validation still count against the limit.
    pub async fn transform(
        &self,
        text: &str,
        identity: &ClientIdentity,
        context: &RequestContext,
    ) -> crate::Result<String> {
        if let Err(error) = self.shared.rate_limits.check(identity).await {
            return Err(match error {
                RateLimitError::LimitExceeded { retry_after } => {
                    log::debug!("Client '{identity}' is rate limited for another {retry_after:?}");
                    TransformError::new(ErrorKind::RateLimited).with_detail(format!("Retry after {retry_after:?}"))
                }
                RateLimitError::Storage(error) => {
                    log::error!("Rate limit check failed: {error}");
                    TransformError::new(ErrorKind::Unknown).with_detail(error.to_string())
                }
            });
        }

        let request = self.shared.builder.build(text)?;
        let api_key = token::get(self.shared.forward_key, self.shared.api_key.as_ref(), context)?;

        self.shared.client.send(&request, api_key).await
    }

    /// Whether a shared upstream key is configured.
    pub fn api_configured(&self) -> bool {
        self.shared.api_key.is_some()
    }
}
