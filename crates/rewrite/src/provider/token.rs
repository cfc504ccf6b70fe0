use secrecy::SecretString;

use crate::{
    error::{ErrorKind, TransformError},
    request::RequestContext,
};

/// Pick the credential of an upstream call.
///
/// With forwarding enabled a key sent by the caller wins over the configured one.
/// Without a usable key the server is misconfigured and nothing is sent upstream.
pub(crate) fn get<'a>(
    forward_key: bool,
    configured_key: Option<&'a SecretString>,
    context: &'a RequestContext,
) -> crate::Result<&'a SecretString> {
    if forward_key && let Some(api_key) = &context.api_key {
        return Ok(api_key);
    }

    configured_key.ok_or_else(|| {
        let detail = if forward_key {
            "Key forwarding is enabled but the request carried no key and none is configured"
        } else {
            "No upstream API key configured"
        };

        TransformError::new(ErrorKind::ServerMisconfigured).with_detail(detail)
    })
}
