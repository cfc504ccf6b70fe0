use config::{AllowedOrigins, CorsConfig};
use http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};

const GLOB_CHARACTERS: &str = "?*[]{}!\\";

pub(super) fn generate(
    CorsConfig {
        allow_credentials,
        allow_origins,
        max_age,
    }: &CorsConfig,
) -> CorsLayer {
    let mut cors_layer = CorsLayer::new()
        .allow_credentials(*allow_credentials)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(allow_origins) = allow_origins {
        cors_layer = cors_layer.allow_origin(match allow_origins {
            AllowedOrigins::Any => AllowOrigin::any(),
            AllowedOrigins::Explicit(origins) => {
                let matcher = OriginMatcher::new(origins);

                if matcher.globs.is_empty() {
                    AllowOrigin::list(matcher.constants)
                } else {
                    AllowOrigin::predicate(move |origin, _| matcher.matches(origin))
                }
            }
        });
    }

    if let Some(max_age) = max_age {
        cors_layer = cors_layer.max_age(*max_age);
    }

    cors_layer
}

struct OriginMatcher {
    constants: Vec<HeaderValue>,
    globs: Vec<String>,
}

impl OriginMatcher {
    fn new(origins: &[String]) -> Self {
        let mut constants = Vec::new();
        let mut globs = Vec::new();

        for origin in origins {
            if origin.chars().any(|c| GLOB_CHARACTERS.contains(c)) {
                globs.push(origin.clone());
                continue;
            }

            match HeaderValue::from_str(origin) {
                Ok(value) => constants.push(value),
                Err(_) => log::warn!("Ignoring CORS origin '{origin}': not a valid header value"),
            }
        }

        Self { constants, globs }
    }

    fn matches(&self, origin: &HeaderValue) -> bool {
        self.constants.iter().any(|constant| constant == origin)
            || self.globs.iter().any(|glob| fast_glob::glob_match(glob, origin))
    }
}
