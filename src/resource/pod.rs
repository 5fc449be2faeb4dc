use k8s_openapi::api::core::v1::{Container, ContainerStatus, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{Columnar, Columns, MetricsSnapshot, Usage};
use crate::format::{
    format_bytes, format_cpu_millicores, human_age, missing, quantity_cpu_millicores,
    quantity_memory_bytes, to_percentage,
};
use crate::model::{ResourceKind, Row, resource_key};

pub static COLUMNS: Columns = Columns {
    kind: ResourceKind::Pods,
    names: &[
        "NAME", "READY", "STATUS", "RESTARTS", "CPU", "MEM", "%CPU/R", "%MEM/R", "IP", "NODE",
        "QOS", "AGE",
    ],
    volatile: Some("AGE"),
};

#[derive(Debug, Clone)]
pub struct PodRow {
    pod: Pod,
    usage: Option<Usage>,
}

impl From<Pod> for PodRow {
    fn from(pod: Pod) -> Self {
        Self { pod, usage: None }
    }
}

impl Columnar for PodRow {
    fn columns(&self) -> &'static Columns {
        &COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.pod.metadata
    }

    fn attach_metrics(&mut self, metrics: &MetricsSnapshot) {
        let key = resource_key(self.namespace(), self.object_name());
        self.usage = metrics.pods.get(&key).copied();
    }

    fn cells(&self) -> Row {
        let status = self.pod.status.as_ref();
        let statuses = status
            .and_then(|status| status.container_statuses.as_deref())
            .unwrap_or(&[]);
        let (ready, total, restarts) = readiness(statuses);
        let usage = self.usage.unwrap_or_default();
        let requested = self.requested();

        vec![
            self.object_name().to_string(),
            format!("{ready}/{total}"),
            phase(&self.pod),
            restarts.to_string(),
            format_cpu_millicores(usage.cpu_millicores),
            format_bytes(usage.memory_bytes),
            to_percentage(usage.cpu_millicores, requested.cpu_millicores).to_string(),
            to_percentage(usage.memory_bytes, requested.memory_bytes).to_string(),
            missing(status.and_then(|status| status.pod_ip.as_deref())),
            missing(
                self.pod
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.node_name.as_deref()),
            ),
            missing(status.and_then(|status| status.qos_class.as_deref())),
            human_age(self.pod.metadata.creation_timestamp.as_ref()),
        ]
    }
}

impl PodRow {
    /// Summed container requests, falling back to limits when a container sets none.
    fn requested(&self) -> Usage {
        self.pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(container_requests)
            .fold(Usage::default(), |acc, usage| Usage {
                cpu_millicores: acc.cpu_millicores.saturating_add(usage.cpu_millicores),
                memory_bytes: acc.memory_bytes.saturating_add(usage.memory_bytes),
            })
    }
}

fn container_requests(container: &Container) -> Usage {
    let Some(resources) = container.resources.as_ref() else {
        return Usage::default();
    };
    let list = resources
        .requests
        .as_ref()
        .filter(|requests| !requests.is_empty())
        .or(resources.limits.as_ref());
    let Some(list) = list else {
        return Usage::default();
    };

    Usage {
        cpu_millicores: quantity_cpu_millicores(list.get("cpu")),
        memory_bytes: quantity_memory_bytes(list.get("memory")),
    }
}

fn readiness(statuses: &[ContainerStatus]) -> (usize, usize, i32) {
    let ready = statuses.iter().filter(|container| container.ready).count();
    let restarts = statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, statuses.len(), restarts)
}

fn phase(pod: &Pod) -> String {
    let status = pod.status.as_ref();
    let mut reason = status
        .and_then(|status| status.reason.clone().filter(|value| !value.is_empty()))
        .or_else(|| status.and_then(|status| status.phase.clone()))
        .unwrap_or_else(|| "Pending".to_string());

    let init_statuses = status
        .and_then(|status| status.init_container_statuses.as_deref())
        .unwrap_or(&[]);
    let init_total = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.init_containers.as_ref())
        .map_or(init_statuses.len(), Vec::len);

    let mut initializing = false;
    for (index, container) in init_statuses.iter().enumerate() {
        let state = container.state.as_ref();
        if let Some(terminated) = state.and_then(|state| state.terminated.as_ref()) {
            if terminated.exit_code == 0 {
                continue;
            }
            reason = match (terminated.reason.as_deref(), terminated.signal) {
                (Some(why), _) if !why.is_empty() => format!("Init:{why}"),
                (_, Some(signal)) if signal != 0 => format!("Init:Signal:{signal}"),
                _ => format!("Init:ExitCode:{}", terminated.exit_code),
            };
        } else if let Some(why) = state
            .and_then(|state| state.waiting.as_ref())
            .and_then(|waiting| waiting.reason.as_deref())
            .filter(|why| !why.is_empty() && *why != "PodInitializing")
        {
            reason = format!("Init:{why}");
        } else {
            reason = format!("Init:{index}/{init_total}");
        }
        initializing = true;
        break;
    }

    if !initializing {
        let statuses = status
            .and_then(|status| status.container_statuses.as_deref())
            .unwrap_or(&[]);
        for container in statuses.iter().rev() {
            let Some(state) = container.state.as_ref() else {
                continue;
            };
            if let Some(why) = state
                .waiting
                .as_ref()
                .and_then(|waiting| waiting.reason.as_deref())
                .filter(|why| !why.is_empty())
            {
                reason = why.to_string();
            } else if let Some(terminated) = state.terminated.as_ref() {
                reason = match (terminated.reason.as_deref(), terminated.signal) {
                    (Some(why), _) if !why.is_empty() => why.to_string(),
                    (_, Some(signal)) if signal != 0 => format!("Signal:{signal}"),
                    _ => format!("ExitCode:{}", terminated.exit_code),
                };
            }
        }
    }

    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }

    reason
}
