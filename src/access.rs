use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::AccessError;
use crate::model::{NamespaceScope, ResourceKind, resource_key};
use crate::resource::{RawObject, Usage};

#[async_trait]
pub trait Accessor: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<RawObject, AccessError>;

    async fn list(&self, scope: &NamespaceScope) -> Result<Vec<RawObject>, AccessError>;

    async fn delete(
        &self,
        namespace: Option<&str>,
        name: &str,
        cascade: bool,
        force: bool,
    ) -> Result<(), AccessError>;
}

pub type LogLines = BoxStream<'static, std::io::Result<String>>;

#[async_trait]
pub trait LogAccessor: Send + Sync {
    async fn open_log_stream(&self, request: &LogRequest) -> Result<LogLines, AccessError>;
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn pod_metrics(
        &self,
        scope: &NamespaceScope,
    ) -> Result<HashMap<String, Usage>, AccessError>;

    async fn node_metrics(&self) -> Result<HashMap<String, Usage>, AccessError>;
}

pub const DEFAULT_LOG_OPEN_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_LOG_TAIL_LINES: i64 = 200;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LogRequest {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    pub tail_lines: Option<i64>,
    pub previous: bool,
    pub open_timeout: Duration,
}

impl LogRequest {
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
            container: None,
            tail_lines: Some(DEFAULT_LOG_TAIL_LINES),
            previous: false,
            open_timeout: DEFAULT_LOG_OPEN_TIMEOUT,
        }
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn tail_lines(mut self, lines: i64) -> Self {
        self.tail_lines = Some(lines);
        self
    }

    pub fn previous(mut self, previous: bool) -> Self {
        self.previous = previous;
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn target(&self) -> String {
        let key = resource_key(Some(&self.namespace), &self.pod);
        match self.container.as_deref() {
            Some(container) => format!("{key}:{container}"),
            None => key,
        }
    }
}
