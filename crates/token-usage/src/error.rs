use thiserror::Error;

/// Failure to set one member inside a JSON record.
///
/// The injector treats each of these as "skip this field": the record keeps whatever the other
/// set operations managed to write.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetFieldError {
    /// The record is not valid JSON at the given byte offset.
    #[error("malformed JSON at byte {offset}")]
    Malformed {
        /// Offset into the record where scanning stopped.
        offset: usize,
    },

    /// The record is JSON, but its top-level value is not an object.
    #[error("document root is not a JSON object")]
    RootNotObject,

    /// An intermediate member of the path exists but holds something other than an object.
    #[error("`{path}` is not a JSON object")]
    NotAnObject {
        /// Dotted path of the offending member.
        path: String,
    },

    /// The value cannot be represented as JSON (NaN or an infinite float).
    #[error("value for `{field}` is not representable in JSON")]
    InvalidValue {
        /// Name of the member that was being set.
        field: &'static str,
    },

    /// An empty member path was supplied.
    #[error("empty member path")]
    EmptyPath,
}

/// Internal-consistency problems detected while driving a request.
///
/// None of these abort the request: the filter logs them and passes the response through.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A body delivery arrived for a request that never got a context at header time.
    #[error("request context is missing for an instrumented response")]
    MissingContext,

    /// The first token time is unset or zero when metrics are about to be computed.
    #[error("first token time is not recorded")]
    FirstTokenNotRecorded,
}
