use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Pods,
    Deployments,
    StatefulSets,
    DaemonSets,
    ReplicaSets,
    Jobs,
    CronJobs,
    Services,
    Endpoints,
    Ingresses,
    ConfigMaps,
    Secrets,
    PersistentVolumeClaims,
    ServiceAccounts,
    Nodes,
    Namespaces,
    PersistentVolumes,
    ClusterRoles,
}

impl ResourceKind {
    pub const ALL: [Self; 18] = [
        Self::Pods,
        Self::Deployments,
        Self::StatefulSets,
        Self::DaemonSets,
        Self::ReplicaSets,
        Self::Jobs,
        Self::CronJobs,
        Self::Services,
        Self::Endpoints,
        Self::Ingresses,
        Self::ConfigMaps,
        Self::Secrets,
        Self::PersistentVolumeClaims,
        Self::ServiceAccounts,
        Self::Nodes,
        Self::Namespaces,
        Self::PersistentVolumes,
        Self::ClusterRoles,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::Deployments => "Deployments",
            Self::StatefulSets => "StatefulSets",
            Self::DaemonSets => "DaemonSets",
            Self::ReplicaSets => "ReplicaSets",
            Self::Jobs => "Jobs",
            Self::CronJobs => "CronJobs",
            Self::Services => "Services",
            Self::Endpoints => "Endpoints",
            Self::Ingresses => "Ingresses",
            Self::ConfigMaps => "ConfigMaps",
            Self::Secrets => "Secrets",
            Self::PersistentVolumeClaims => "PVC",
            Self::ServiceAccounts => "ServiceAccounts",
            Self::Nodes => "Nodes",
            Self::Namespaces => "Namespaces",
            Self::PersistentVolumes => "PersistentVolumes",
            Self::ClusterRoles => "ClusterRoles",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "po" | "pod" | "pods" => Some(Self::Pods),
            "deploy" | "deployment" | "deployments" | "dp" => Some(Self::Deployments),
            "sts" | "statefulset" | "statefulsets" => Some(Self::StatefulSets),
            "ds" | "daemonset" | "daemonsets" | "daemon-set" | "daemon-sets" => {
                Some(Self::DaemonSets)
            }
            "rs" | "replicaset" | "replicasets" | "replica-set" | "replica-sets" => {
                Some(Self::ReplicaSets)
            }
            "job" | "jobs" => Some(Self::Jobs),
            "cj" | "cronjob" | "cronjobs" | "cron-job" | "cron-jobs" => Some(Self::CronJobs),
            "svc" | "service" | "services" => Some(Self::Services),
            "ep" | "endpoint" | "endpoints" => Some(Self::Endpoints),
            "ing" | "ingress" | "ingresses" => Some(Self::Ingresses),
            "cm" | "configmap" | "configmaps" | "config-map" | "config-maps" => {
                Some(Self::ConfigMaps)
            }
            "secret" | "secrets" => Some(Self::Secrets),
            "pvc"
            | "persistentvolumeclaim"
            | "persistentvolumeclaims"
            | "persistent-volume-claim"
            | "persistent-volume-claims" => Some(Self::PersistentVolumeClaims),
            "sa" | "serviceaccount" | "serviceaccounts" | "service-account"
            | "service-accounts" => Some(Self::ServiceAccounts),
            "no" | "node" | "nodes" => Some(Self::Nodes),
            "ns" | "namespace" | "namespaces" => Some(Self::Namespaces),
            "pv" | "persistentvolume" | "persistentvolumes" | "persistent-volume"
            | "persistent-volumes" => Some(Self::PersistentVolumes),
            "cr" | "crole" | "clusterrole" | "clusterroles" | "cluster-role" | "cluster-roles" => {
                Some(Self::ClusterRoles)
            }
            _ => None,
        }
    }

    pub fn short_token(self) -> &'static str {
        match self {
            Self::Pods => "po",
            Self::Deployments => "deploy",
            Self::StatefulSets => "sts",
            Self::DaemonSets => "ds",
            Self::ReplicaSets => "rs",
            Self::Jobs => "job",
            Self::CronJobs => "cj",
            Self::Services => "svc",
            Self::Endpoints => "ep",
            Self::Ingresses => "ing",
            Self::ConfigMaps => "cm",
            Self::Secrets => "secret",
            Self::PersistentVolumeClaims => "pvc",
            Self::ServiceAccounts => "sa",
            Self::Nodes => "no",
            Self::Namespaces => "ns",
            Self::PersistentVolumes => "pv",
            Self::ClusterRoles => "cr",
        }
    }

    pub fn namespaced(self) -> bool {
        !matches!(
            self,
            Self::Nodes | Self::Namespaces | Self::PersistentVolumes | Self::ClusterRoles
        )
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NamespaceScope {
    All,
    Named(String),
    NotNamespaced,
}

impl NamespaceScope {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Cluster-scoped kinds ignore whatever namespace the caller asked for.
    pub fn for_kind(self, kind: ResourceKind) -> Self {
        if kind.namespaced() {
            self
        } else {
            Self::NotNamespaced
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Named(namespace) => Some(namespace),
            Self::All | Self::NotNamespaced => None,
        }
    }
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
            Self::NotNamespaced => write!(f, "-"),
        }
    }
}

pub fn resource_key(namespace: Option<&str>, name: &str) -> String {
    match namespace.filter(|value| !value.is_empty()) {
        Some(namespace) => format!("{namespace}/{name}"),
        None => name.to_string(),
    }
}

pub fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, key),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowAction {
    Added,
    Modified,
    Unchanged,
}

impl RowAction {
    pub fn marker(self) -> char {
        match self {
            Self::Added => '+',
            Self::Modified => '~',
            Self::Unchanged => ' ',
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RowEvent {
    pub action: RowAction,
    pub fields: Row,
    /// Prior value of each cell that changed since the last poll, empty otherwise.
    pub deltas: Row,
}

impl RowEvent {
    pub fn added(fields: Row) -> Self {
        let deltas = vec![String::new(); fields.len()];
        Self {
            action: RowAction::Added,
            fields,
            deltas,
        }
    }

    pub fn has_deltas(&self) -> bool {
        self.deltas.iter().any(|delta| !delta.is_empty())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableData {
    pub header: Row,
    pub rows: BTreeMap<String, RowEvent>,
    pub scope: NamespaceScope,
    pub unavailable: Vec<String>,
    pub last_refreshed: Option<DateTime<Local>>,
}

impl TableData {
    pub fn new(header: Row, scope: NamespaceScope) -> Self {
        Self {
            header,
            rows: BTreeMap::new(),
            scope,
            unavailable: Vec::new(),
            last_refreshed: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
