mod config;
mod network;
mod node;
mod pod;
mod storage;
mod workload;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::ClusterRole;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::AdaptationError;
use crate::model::{NamespaceScope, ResourceKind, Row, resource_key};

pub use node::NodeRow;
pub use pod::PodRow;

#[derive(Debug)]
pub struct Columns {
    pub kind: ResourceKind,
    pub names: &'static [&'static str],
    /// Column expected to change on every poll; excluded from diffing.
    pub volatile: Option<&'static str>,
}

impl Columns {
    pub fn header(&self, scope: &NamespaceScope) -> Row {
        let mut header = Vec::with_capacity(self.names.len() + 1);
        if self.prefixes_namespace(scope) {
            header.push("NAMESPACE".to_string());
        }
        header.extend(self.names.iter().map(|name| name.to_string()));
        header
    }

    pub fn volatile_index(&self, scope: &NamespaceScope) -> Option<usize> {
        let volatile = self.volatile?;
        self.header(scope)
            .iter()
            .position(|column| column == volatile)
    }

    pub fn prefixes_namespace(&self, scope: &NamespaceScope) -> bool {
        self.kind.namespaced() && scope.is_all()
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Usage {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub pods: HashMap<String, Usage>,
    pub nodes: HashMap<String, Usage>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MetricsNeed {
    None,
    Pods,
    Nodes,
}

/// Columnar view over one adapted object.
///
/// `fields` must be deterministic for unchanged input and always match
/// `header` in length for the same scope.
pub trait Columnar: Debug + Send + Sync {
    fn columns(&self) -> &'static Columns;

    fn metadata(&self) -> &ObjectMeta;

    fn cells(&self) -> Row;

    /// Attaches a metrics sample. Must happen before any `fields` call.
    fn attach_metrics(&mut self, _metrics: &MetricsSnapshot) {}

    fn namespace(&self) -> Option<&str> {
        if !self.columns().kind.namespaced() {
            return None;
        }
        self.metadata().namespace.as_deref()
    }

    fn object_name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    fn header(&self, scope: &NamespaceScope) -> Row {
        self.columns().header(scope)
    }

    fn fields(&self, scope: &NamespaceScope) -> Row {
        let cells = self.cells();
        if !self.columns().prefixes_namespace(scope) {
            return cells;
        }
        let mut row = Vec::with_capacity(cells.len() + 1);
        row.push(self.namespace().unwrap_or_default().to_string());
        row.extend(cells);
        row
    }

    fn name(&self) -> String {
        resource_key(self.namespace(), self.object_name())
    }
}

pub trait KindObject: DeserializeOwned + Sized {
    const KIND: ResourceKind;

    fn from_raw(raw: RawObject) -> Result<Self, AdaptationError>;
}

fn decode<T: KindObject>(value: Value) -> Result<T, AdaptationError> {
    serde_json::from_value(value).map_err(|source| AdaptationError::Malformed {
        kind: T::KIND,
        source,
    })
}

macro_rules! raw_objects {
    ($($variant:ident($native:ty)),* $(,)?) => {
        #[derive(Debug, Clone)]
        pub enum RawObject {
            $($variant(Box<$native>),)*
            Dynamic(Box<DynamicObject>),
            Untyped(Value),
        }

        impl RawObject {
            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => ResourceKind::$variant.title(),)*
                    Self::Dynamic(_) => "dynamic",
                    Self::Untyped(_) => "untyped",
                }
            }

            pub fn identity(&self) -> Option<String> {
                let (namespace, name) = match self {
                    $(Self::$variant(object) => (
                        object.metadata.namespace.clone(),
                        object.metadata.name.clone(),
                    ),)*
                    Self::Dynamic(object) => (
                        object.metadata.namespace.clone(),
                        object.metadata.name.clone(),
                    ),
                    Self::Untyped(value) => (
                        value
                            .pointer("/metadata/namespace")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        value
                            .pointer("/metadata/name")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    ),
                };
                name.map(|name| resource_key(namespace.as_deref(), &name))
            }

            pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
                match self {
                    $(Self::$variant(object) => serde_yaml::to_string(object.as_ref()),)*
                    Self::Dynamic(object) => serde_yaml::to_string(object.as_ref()),
                    Self::Untyped(value) => serde_yaml::to_string(value),
                }
            }
        }

        $(
            impl From<$native> for RawObject {
                fn from(object: $native) -> Self {
                    Self::$variant(Box::new(object))
                }
            }

            impl From<Box<$native>> for RawObject {
                fn from(object: Box<$native>) -> Self {
                    Self::$variant(object)
                }
            }

            impl From<&$native> for RawObject {
                fn from(object: &$native) -> Self {
                    Self::$variant(Box::new(object.clone()))
                }
            }

            impl KindObject for $native {
                const KIND: ResourceKind = ResourceKind::$variant;

                fn from_raw(raw: RawObject) -> Result<Self, AdaptationError> {
                    match raw {
                        RawObject::$variant(object) => Ok(*object),
                        RawObject::Dynamic(object) => {
                            let value = serde_json::to_value(*object).map_err(|source| {
                                AdaptationError::Malformed { kind: Self::KIND, source }
                            })?;
                            decode(value)
                        }
                        RawObject::Untyped(value) => decode(value),
                        #[allow(unreachable_patterns)]
                        other => Err(AdaptationError::KindMismatch {
                            expected: Self::KIND,
                            found: other.label(),
                        }),
                    }
                }
            }
        )*
    };
}

raw_objects! {
    Pods(Pod),
    Deployments(Deployment),
    StatefulSets(StatefulSet),
    DaemonSets(DaemonSet),
    ReplicaSets(ReplicaSet),
    Jobs(Job),
    CronJobs(CronJob),
    Services(Service),
    Endpoints(Endpoints),
    Ingresses(Ingress),
    ConfigMaps(ConfigMap),
    Secrets(Secret),
    PersistentVolumeClaims(PersistentVolumeClaim),
    ServiceAccounts(ServiceAccount),
    Nodes(Node),
    Namespaces(Namespace),
    PersistentVolumes(PersistentVolume),
    ClusterRoles(ClusterRole),
}

impl From<DynamicObject> for RawObject {
    fn from(object: DynamicObject) -> Self {
        Self::Dynamic(Box::new(object))
    }
}

impl From<Value> for RawObject {
    fn from(value: Value) -> Self {
        Self::Untyped(value)
    }
}

pub type Constructor = fn(RawObject) -> Result<Box<dyn Columnar>, AdaptationError>;

fn construct<K, A>(raw: RawObject) -> Result<Box<dyn Columnar>, AdaptationError>
where
    K: KindObject,
    A: Columnar + From<K> + 'static,
{
    Ok(Box::new(A::from(K::from_raw(raw)?)))
}

#[derive(Clone, Copy)]
pub struct KindEntry {
    pub columns: &'static Columns,
    pub metrics: MetricsNeed,
    construct: Constructor,
}

impl KindEntry {
    pub fn adapt(&self, raw: RawObject) -> Result<Box<dyn Columnar>, AdaptationError> {
        (self.construct)(raw)
    }
}

impl Debug for KindEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindEntry")
            .field("kind", &self.columns.kind)
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ResourceKind, KindEntry>,
}

impl Registry {
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register(&pod::COLUMNS, MetricsNeed::Pods, construct::<Pod, PodRow>);
        registry.register(
            &workload::DEPLOYMENT_COLUMNS,
            MetricsNeed::None,
            construct::<Deployment, workload::DeploymentRow>,
        );
        registry.register(
            &workload::STATEFULSET_COLUMNS,
            MetricsNeed::None,
            construct::<StatefulSet, workload::StatefulSetRow>,
        );
        registry.register(
            &workload::DAEMONSET_COLUMNS,
            MetricsNeed::None,
            construct::<DaemonSet, workload::DaemonSetRow>,
        );
        registry.register(
            &workload::REPLICASET_COLUMNS,
            MetricsNeed::None,
            construct::<ReplicaSet, workload::ReplicaSetRow>,
        );
        registry.register(
            &workload::JOB_COLUMNS,
            MetricsNeed::None,
            construct::<Job, workload::JobRow>,
        );
        registry.register(
            &workload::CRONJOB_COLUMNS,
            MetricsNeed::None,
            construct::<CronJob, workload::CronJobRow>,
        );
        registry.register(
            &network::SERVICE_COLUMNS,
            MetricsNeed::None,
            construct::<Service, network::ServiceRow>,
        );
        registry.register(
            &network::ENDPOINTS_COLUMNS,
            MetricsNeed::None,
            construct::<Endpoints, network::EndpointsRow>,
        );
        registry.register(
            &network::INGRESS_COLUMNS,
            MetricsNeed::None,
            construct::<Ingress, network::IngressRow>,
        );
        registry.register(
            &config::CONFIGMAP_COLUMNS,
            MetricsNeed::None,
            construct::<ConfigMap, config::ConfigMapRow>,
        );
        registry.register(
            &config::SECRET_COLUMNS,
            MetricsNeed::None,
            construct::<Secret, config::SecretRow>,
        );
        registry.register(
            &storage::PVC_COLUMNS,
            MetricsNeed::None,
            construct::<PersistentVolumeClaim, storage::PersistentVolumeClaimRow>,
        );
        registry.register(
            &config::SERVICE_ACCOUNT_COLUMNS,
            MetricsNeed::None,
            construct::<ServiceAccount, config::ServiceAccountRow>,
        );
        registry.register(&node::COLUMNS, MetricsNeed::Nodes, construct::<Node, NodeRow>);
        registry.register(
            &config::NAMESPACE_COLUMNS,
            MetricsNeed::None,
            construct::<Namespace, config::NamespaceRow>,
        );
        registry.register(
            &storage::PV_COLUMNS,
            MetricsNeed::None,
            construct::<PersistentVolume, storage::PersistentVolumeRow>,
        );
        registry.register(
            &config::CLUSTER_ROLE_COLUMNS,
            MetricsNeed::None,
            construct::<ClusterRole, config::ClusterRoleRow>,
        );
        registry
    }

    pub fn register(
        &mut self,
        columns: &'static Columns,
        metrics: MetricsNeed,
        construct: Constructor,
    ) {
        self.entries.insert(
            columns.kind,
            KindEntry {
                columns,
                metrics,
                construct,
            },
        );
    }

    pub fn entry(&self, kind: ResourceKind) -> Result<KindEntry, AdaptationError> {
        self.entries
            .get(&kind)
            .copied()
            .ok_or(AdaptationError::Unregistered(kind))
    }
}
