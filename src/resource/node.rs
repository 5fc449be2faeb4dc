use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{Columnar, Columns, MetricsSnapshot, Usage};
use crate::format::{
    MISSING, format_bytes, format_cpu_millicores, human_age, missing, quantity_cpu_millicores,
    quantity_memory_bytes, to_percentage,
};
use crate::model::{ResourceKind, Row};

pub static COLUMNS: Columns = Columns {
    kind: ResourceKind::Nodes,
    names: &[
        "NAME",
        "STATUS",
        "ROLES",
        "VERSION",
        "INTERNAL-IP",
        "EXTERNAL-IP",
        "CPU",
        "MEM",
        "%CPU",
        "%MEM",
        "AGE",
    ],
    volatile: Some("AGE"),
};

#[derive(Debug, Clone)]
pub struct NodeRow {
    node: Node,
    usage: Option<Usage>,
}

impl From<Node> for NodeRow {
    fn from(node: Node) -> Self {
        Self { node, usage: None }
    }
}

impl Columnar for NodeRow {
    fn columns(&self) -> &'static Columns {
        &COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.node.metadata
    }

    fn attach_metrics(&mut self, metrics: &MetricsSnapshot) {
        self.usage = metrics.nodes.get(self.object_name()).copied();
    }

    fn cells(&self) -> Row {
        let status = self.node.status.as_ref();
        let usage = self.usage.unwrap_or_default();
        let allocatable = status.and_then(|status| status.allocatable.as_ref());
        let cpu_total = quantity_cpu_millicores(allocatable.and_then(|list| list.get("cpu")));
        let memory_total = quantity_memory_bytes(allocatable.and_then(|list| list.get("memory")));

        vec![
            self.object_name().to_string(),
            self.status(),
            self.roles(),
            missing(
                status
                    .and_then(|status| status.node_info.as_ref())
                    .map(|info| info.kubelet_version.as_str()),
            ),
            self.address("InternalIP"),
            self.address("ExternalIP"),
            format_cpu_millicores(usage.cpu_millicores),
            format_bytes(usage.memory_bytes),
            to_percentage(usage.cpu_millicores, cpu_total).to_string(),
            to_percentage(usage.memory_bytes, memory_total).to_string(),
            human_age(self.node.metadata.creation_timestamp.as_ref()),
        ]
    }
}

impl NodeRow {
    fn status(&self) -> String {
        let ready = self
            .node
            .status
            .as_ref()
            .and_then(|status| status.conditions.as_ref())
            .and_then(|conditions| {
                conditions
                    .iter()
                    .find(|condition| condition.type_ == "Ready")
            })
            .map(|condition| match condition.status.as_str() {
                "True" => "Ready",
                "False" => "NotReady",
                _ => "Unknown",
            })
            .unwrap_or("Unknown");

        let unschedulable = self
            .node
            .spec
            .as_ref()
            .and_then(|spec| spec.unschedulable)
            .unwrap_or(false);
        if unschedulable {
            format!("{ready},SchedulingDisabled")
        } else {
            ready.to_string()
        }
    }

    fn roles(&self) -> String {
        let Some(labels) = self.node.metadata.labels.as_ref() else {
            return MISSING.to_string();
        };

        let mut roles = labels
            .keys()
            .filter_map(|key| key.strip_prefix("node-role.kubernetes.io/"))
            .map(|role| {
                if role.is_empty() {
                    "worker".to_string()
                } else {
                    role.to_string()
                }
            })
            .collect::<Vec<_>>();

        if roles.is_empty()
            && let Some(role) = labels.get("kubernetes.io/role")
        {
            roles.push(role.clone());
        }

        if roles.is_empty() {
            MISSING.to_string()
        } else {
            roles.sort();
            roles.dedup();
            roles.join(",")
        }
    }

    fn address(&self, kind: &str) -> String {
        missing(
            self.node
                .status
                .as_ref()
                .and_then(|status| status.addresses.as_ref())
                .and_then(|addresses| addresses.iter().find(|address| address.type_ == kind))
                .map(|address| address.address.as_str()),
        )
    }
}
