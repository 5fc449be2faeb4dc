use thiserror::Error;

use crate::model::ResourceKind;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("failed to {verb} {target}")]
    Api {
        verb: &'static str,
        target: String,
        #[source]
        source: kube::Error,
    },

    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    #[error("namespace is required to {verb} {kind} {name}")]
    MissingNamespace {
        verb: &'static str,
        kind: ResourceKind,
        name: String,
    },
}

impl AccessError {
    pub fn api(verb: &'static str, target: impl Into<String>, source: kube::Error) -> Self {
        Self::Api {
            verb,
            target: target.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum AdaptationError {
    #[error("expected a {expected} object but received a {found} object")]
    KindMismatch {
        expected: ResourceKind,
        found: &'static str,
    },

    #[error("untyped payload is not a valid {kind} object: {source}")]
    Malformed {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("no adapter is registered for {0}")]
    Unregistered(ResourceKind),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to open log stream")]
    Open(#[from] AccessError),

    #[error("log stream read failed")]
    Read(#[source] std::io::Error),

    #[error("log reader task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Adaptation(#[from] AdaptationError),

    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}
