use http::{HeaderName, Uri};
use serde::Deserialize;

/// Token usage instrumentation configuration.
///
/// Field names keep the camel case of the gateway plugin configuration format.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenUsageConfig {
    /// Header that receives the client IP of instrumented requests. Empty disables it.
    #[serde(rename = "realIPToHeader")]
    pub real_ip_to_header: String,
    /// Path suffixes instrumented in addition to the built-in generation endpoints.
    #[serde(rename = "enableOnPathSuffix")]
    pub enable_on_path_suffix: Vec<String>,
}

impl TokenUsageConfig {
    /// Whether the client IP should be forwarded in a header.
    pub fn forwards_real_ip(&self) -> bool {
        !self.real_ip_to_header.is_empty()
    }

    /// The header receiving the client IP, if set to a valid header name.
    pub fn real_ip_header(&self) -> Option<HeaderName> {
        if !self.forwards_real_ip() {
            return None;
        }

        HeaderName::try_from(self.real_ip_to_header.as_str()).ok()
    }

    /// The configured suffixes that are usable, invalid entries left out.
    pub fn path_suffixes(&self) -> impl Iterator<Item = &str> {
        self.enable_on_path_suffix
            .iter()
            .map(String::as_str)
            .filter(|suffix| is_request_uri(suffix))
    }

    /// Entries that are ignored. None of them is fatal.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.forwards_real_ip() && self.real_ip_header().is_none() {
            warnings.push(format!(
                "token_usage.realIPToHeader '{}' is not a valid header name, real IP forwarding is disabled",
                self.real_ip_to_header
            ));
        }

        for suffix in self.enable_on_path_suffix.iter().filter(|suffix| !is_request_uri(suffix)) {
            warnings.push(format!(
                "token_usage.enableOnPathSuffix '{suffix}' is not a valid request URI and will be ignored"
            ));
        }

        warnings
    }
}

/// Parses `value` as a request target: an absolute URI, or an absolute path.
pub fn parse_request_uri(value: &str) -> Option<Uri> {
    let uri = value.parse::<Uri>().ok()?;

    if uri.scheme().is_none() && !value.starts_with('/') {
        return None;
    }

    Some(uri)
}

/// Whether `value` is one of the two forms a request target takes.
pub fn is_request_uri(value: &str) -> bool {
    parse_request_uri(value).is_some()
}
