use std::collections::BTreeSet;

use config::{is_request_uri, parse_request_uri};

/// Path suffixes that are always instrumented.
pub const DEFAULT_PATH_SUFFIXES: [&str; 8] = [
    "/chat/completions",
    "/completions",
    "/embeddings",
    "/audio/transcriptions",
    "/audio/speech",
    "/images/generations",
    "/images/edits",
    "/rerank",
];

/// Decides from the request target whether a request is instrumented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeMatcher {
    suffixes: BTreeSet<String>,
}

impl Default for ScopeMatcher {
    fn default() -> Self {
        Self {
            suffixes: DEFAULT_PATH_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScopeMatcher {
    /// Builds a matcher from the defaults plus `extra` suffixes.
    ///
    /// Entries that are not valid request URIs are logged and skipped.
    pub fn with_suffixes<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();

        for suffix in extra {
            let suffix = suffix.as_ref();

            if !is_request_uri(suffix) {
                log::debug!("enableOnPathSuffix: '{suffix}' is not a valid request URI, skipping");
                continue;
            }

            matcher.suffixes.insert(suffix.to_string());
        }

        matcher
    }

    /// All suffixes this matcher accepts.
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.suffixes.iter().map(String::as_str)
    }

    /// Returns true when the path of `target` ends with one of the configured suffixes.
    ///
    /// Only the path is compared; query and fragment are ignored. A target that does not parse
    /// as a request URI is never instrumented.
    pub fn should_process(&self, target: &str) -> bool {
        let Some(uri) = parse_request_uri(target) else {
            log::debug!("should_process: invalid request target '{target}'");
            return false;
        };

        let path = uri.path();

        match self.suffixes.iter().find(|suffix| !suffix.is_empty() && path.ends_with(suffix.as_str())) {
            Some(suffix) => {
                log::debug!("should_process: matched suffix {suffix} for path {path}");
                true
            }
            None => {
                log::debug!("should_process: no match for path {path}");
                false
            }
        }
    }
}
