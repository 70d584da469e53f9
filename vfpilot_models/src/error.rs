use crate::models::Kind;

/// Failure to turn a document into a bootloader, a device or a whole
/// virtual machine. A decode never applies partially.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed document: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("expected a JSON object carrying a 'kind' field")]
    NotAnObject,
    #[error("missing 'kind' field")]
    MissingKind,
    #[error("unknown 'kind' field: '{0}'")]
    UnknownKind(String),
    #[error("'{0}' is a {1} kind, not a {2} kind")]
    WrongCategory(Kind, &'static str, &'static str),
    #[error("invalid '{kind}' payload: {source}")]
    Payload {
        kind: Kind,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid hardware address '{0}'")]
    InvalidMacAddress(String),
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
