use chrono::Local;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::access::{Accessor, MetricsSource};
use crate::error::{AccessError, AdaptationError, Error};
use crate::model::{NamespaceScope, ResourceKind, Row, RowAction, RowEvent, TableData, split_key};
use crate::resource::{KindEntry, MetricsNeed, MetricsSnapshot, RawObject, Registry};

#[derive(Debug, Default)]
struct Snapshot {
    rows: Vec<(String, Row)>,
    unavailable: Vec<String>,
}

// Single writer: the owner serializes reconcile() and does not read data() while one is in flight.
pub struct ResourceCache {
    kind: ResourceKind,
    entry: KindEntry,
    accessor: Arc<dyn Accessor>,
    metrics: Option<Arc<dyn MetricsSource>>,
    data: TableData,
}

impl ResourceCache {
    pub fn new(
        registry: &Registry,
        kind: ResourceKind,
        scope: NamespaceScope,
        accessor: Arc<dyn Accessor>,
        metrics: Option<Arc<dyn MetricsSource>>,
    ) -> Result<Self, AdaptationError> {
        let entry = registry.entry(kind)?;
        if accessor.kind() != kind {
            return Err(AdaptationError::KindMismatch {
                expected: kind,
                found: accessor.kind().title(),
            });
        }
        let scope = scope.for_kind(kind);
        let data = TableData::new(entry.columns.header(&scope), scope);

        Ok(Self {
            kind,
            entry,
            accessor,
            metrics,
            data,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.data.scope
    }

    pub fn data(&self) -> &TableData {
        &self.data
    }

    pub async fn reconcile(&mut self) -> Result<(), AccessError> {
        let objects = self.accessor.list(&self.data.scope).await.map_err(|error| {
            warn!(kind = %self.kind, scope = %self.data.scope, error = %error, "reconcile fetch failed");
            error
        })?;
        let metrics = self.sample_metrics().await;
        let snapshot = self.adapt(objects, &metrics);
        self.apply(snapshot);
        Ok(())
    }

    pub async fn describe(&self, key: &str) -> Result<String, Error> {
        let (namespace, name) = self.target("describe", key)?;
        let object = self.accessor.get(namespace, name).await?;
        object.to_yaml().map_err(|source| Error::Encode {
            key: key.to_string(),
            source,
        })
    }

    pub async fn delete(&self, key: &str, cascade: bool, force: bool) -> Result<(), AccessError> {
        let (namespace, name) = self.target("delete", key)?;
        self.accessor.delete(namespace, name, cascade, force).await?;
        debug!(kind = %self.kind, key, cascade, force, "delete requested");
        Ok(())
    }

    fn target<'a>(
        &'a self,
        verb: &'static str,
        key: &'a str,
    ) -> Result<(Option<&'a str>, &'a str), AccessError> {
        let (namespace, name) = split_key(key);
        if !self.kind.namespaced() {
            return Ok((None, name));
        }
        match namespace.or_else(|| self.data.scope.namespace()) {
            Some(namespace) => Ok((Some(namespace), name)),
            None => Err(AccessError::MissingNamespace {
                verb,
                kind: self.kind,
                name: name.to_string(),
            }),
        }
    }

    async fn sample_metrics(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        let Some(source) = self.metrics.as_ref() else {
            return snapshot;
        };

        let sampled = match self.entry.metrics {
            MetricsNeed::None => return snapshot,
            MetricsNeed::Pods => source
                .pod_metrics(&self.data.scope)
                .await
                .map(|pods| snapshot.pods = pods),
            MetricsNeed::Nodes => source
                .node_metrics()
                .await
                .map(|nodes| snapshot.nodes = nodes),
        };
        if let Err(error) = sampled {
            warn!(kind = %self.kind, error = %error, "metrics unavailable; rendering zero usage");
        }
        snapshot
    }

    fn adapt(&self, objects: Vec<RawObject>, metrics: &MetricsSnapshot) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for raw in objects {
            let identity = raw.identity().unwrap_or_else(|| raw.label().to_string());
            match self.entry.adapt(raw) {
                Ok(mut row) => {
                    row.attach_metrics(metrics);
                    let fields = row.fields(&self.data.scope);
                    let width = row.header(&self.data.scope).len();
                    if fields.len() != width {
                        warn!(
                            kind = %self.kind,
                            object = %identity,
                            cells = fields.len(),
                            columns = width,
                            "row does not match its header, skipping object"
                        );
                        snapshot.unavailable.push(identity);
                        continue;
                    }
                    snapshot.rows.push((row.name(), fields));
                }
                Err(error) => {
                    warn!(kind = %self.kind, object = %identity, error = %error, "skipping object");
                    snapshot.unavailable.push(identity);
                }
            }
        }
        snapshot
    }

    fn apply(&mut self, snapshot: Snapshot) {
        let volatile = self.entry.columns.volatile_index(&self.data.scope);
        let mut previous = std::mem::take(&mut self.data.rows);
        let mut rows = BTreeMap::new();
        let (mut added, mut modified) = (0usize, 0usize);

        for (key, fields) in snapshot.rows {
            let event = match previous.remove(&key) {
                Some(prior) => diff(&prior.fields, fields, volatile),
                None => RowEvent::added(fields),
            };
            match event.action {
                RowAction::Added => added += 1,
                RowAction::Modified => modified += 1,
                RowAction::Unchanged => {}
            }
            rows.insert(key, event);
        }

        debug!(
            kind = %self.kind,
            scope = %self.data.scope,
            added,
            modified,
            removed = previous.len(),
            unavailable = snapshot.unavailable.len(),
            "reconciled"
        );
        self.data.rows = rows;
        self.data.unavailable = snapshot.unavailable;
        self.data.last_refreshed = Some(Local::now());
    }
}

fn diff(prior: &[String], fields: Row, volatile: Option<usize>) -> RowEvent {
    let mut deltas = vec![String::new(); fields.len()];
    let mut changed = false;

    for (index, field) in fields.iter().enumerate() {
        if Some(index) == volatile {
            continue;
        }
        let before = prior.get(index).map(String::as_str).unwrap_or_default();
        if before != field {
            deltas[index] = before.to_string();
            changed = true;
        }
    }

    RowEvent {
        action: if changed {
            RowAction::Modified
        } else {
            RowAction::Unchanged
        },
        fields,
        deltas,
    }
}
