use duration_str::deserialize_option_duration;
use std::time::Duration;

/// Configuration for CORS (Cross-Origin Resource Sharing)
#[derive(Clone, Default, Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// If false (or not defined), credentials are not allowed in requests
    pub allow_credentials: bool,
    /// Origins from which we allow requests. Entries may contain glob patterns,
    /// e.g. `https://*.pages.dev`.
    pub allow_origins: Option<AllowedOrigins>,
    /// Maximum time between OPTIONS and the next request
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub max_age: Option<Duration>,
}

/// Either every origin (`"*"` or `"any"`), or an explicit list of origins.
#[derive(Clone, Debug, PartialEq)]
pub enum AllowedOrigins {
    /// Any origin is allowed.
    Any,
    /// Only the listed origins (or glob patterns) are allowed.
    Explicit(Vec<String>),
}

impl<'de> serde::Deserialize<'de> for AllowedOrigins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct OriginsVisitor;

        impl<'de> serde::de::Visitor<'de> for OriginsVisitor {
            type Value = AllowedOrigins;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("expecting string \"*\", \"any\", or an array of origins")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match value {
                    "*" | "any" => Ok(AllowedOrigins::Any),
                    origin => Ok(AllowedOrigins::Explicit(vec![normalize_origin(origin)])),
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut origins = Vec::new();

                while let Some(origin) = seq.next_element::<String>()? {
                    origins.push(normalize_origin(&origin));
                }

                Ok(AllowedOrigins::Explicit(origins))
            }
        }

        deserializer.deserialize_any(OriginsVisitor)
    }
}

/// Browsers send the `Origin` header without a trailing slash.
fn normalize_origin(origin: &str) -> String {
    origin.trim_end_matches('/').to_string()
}
