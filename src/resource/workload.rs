use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::{Columnar, Columns};
use crate::format::{NA, bool_to_str, format_elapsed_seconds, human_age, map_to_str, truncate};
use crate::model::{ResourceKind, Row};

pub static DEPLOYMENT_COLUMNS: Columns = Columns {
    kind: ResourceKind::Deployments,
    names: &["NAME", "DESIRED", "CURRENT", "UP-TO-DATE", "AVAILABLE", "AGE"],
    volatile: Some("AGE"),
};

pub static STATEFULSET_COLUMNS: Columns = Columns {
    kind: ResourceKind::StatefulSets,
    names: &["NAME", "DESIRED", "CURRENT", "AGE"],
    volatile: Some("AGE"),
};

pub static DAEMONSET_COLUMNS: Columns = Columns {
    kind: ResourceKind::DaemonSets,
    names: &[
        "NAME",
        "DESIRED",
        "CURRENT",
        "READY",
        "UP-TO-DATE",
        "AVAILABLE",
        "NODE_SELECTOR",
        "AGE",
    ],
    volatile: Some("AGE"),
};

pub static REPLICASET_COLUMNS: Columns = Columns {
    kind: ResourceKind::ReplicaSets,
    names: &["NAME", "DESIRED", "CURRENT", "READY", "AGE"],
    volatile: Some("AGE"),
};

pub static JOB_COLUMNS: Columns = Columns {
    kind: ResourceKind::Jobs,
    names: &["NAME", "COMPLETIONS", "DURATION", "AGE"],
    volatile: Some("AGE"),
};

pub static CRONJOB_COLUMNS: Columns = Columns {
    kind: ResourceKind::CronJobs,
    names: &["NAME", "SCHEDULE", "SUSPEND", "ACTIVE", "LAST_SCHEDULE", "AGE"],
    volatile: Some("AGE"),
};

#[derive(Debug, Clone)]
pub struct DeploymentRow(Deployment);

impl From<Deployment> for DeploymentRow {
    fn from(deployment: Deployment) -> Self {
        Self(deployment)
    }
}

impl Columnar for DeploymentRow {
    fn columns(&self) -> &'static Columns {
        &DEPLOYMENT_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let desired = self
            .0
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = self.0.status.as_ref();
        let current = status.and_then(|status| status.replicas).unwrap_or(0);
        let updated = status
            .and_then(|status| status.updated_replicas)
            .unwrap_or(0);
        let available = status
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);

        vec![
            self.object_name().to_string(),
            desired.to_string(),
            current.to_string(),
            updated.to_string(),
            available.to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct StatefulSetRow(StatefulSet);

impl From<StatefulSet> for StatefulSetRow {
    fn from(statefulset: StatefulSet) -> Self {
        Self(statefulset)
    }
}

impl Columnar for StatefulSetRow {
    fn columns(&self) -> &'static Columns {
        &STATEFULSET_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let desired = self
            .0
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let current = self.0.status.as_ref().map_or(0, |status| status.replicas);

        vec![
            self.object_name().to_string(),
            desired.to_string(),
            current.to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct DaemonSetRow(DaemonSet);

impl From<DaemonSet> for DaemonSetRow {
    fn from(daemonset: DaemonSet) -> Self {
        Self(daemonset)
    }
}

impl Columnar for DaemonSetRow {
    fn columns(&self) -> &'static Columns {
        &DAEMONSET_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let status = self.0.status.as_ref();
        let desired = status.map_or(0, |status| status.desired_number_scheduled);
        let current = status.map_or(0, |status| status.current_number_scheduled);
        let ready = status.map_or(0, |status| status.number_ready);
        let updated = status
            .and_then(|status| status.updated_number_scheduled)
            .unwrap_or(0);
        let available = status
            .and_then(|status| status.number_available)
            .unwrap_or(0);
        let selector = self
            .0
            .spec
            .as_ref()
            .and_then(|spec| spec.template.spec.as_ref())
            .and_then(|spec| spec.node_selector.as_ref());

        vec![
            self.object_name().to_string(),
            desired.to_string(),
            current.to_string(),
            ready.to_string(),
            updated.to_string(),
            available.to_string(),
            map_to_str(selector),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ReplicaSetRow(ReplicaSet);

impl From<ReplicaSet> for ReplicaSetRow {
    fn from(replicaset: ReplicaSet) -> Self {
        Self(replicaset)
    }
}

impl Columnar for ReplicaSetRow {
    fn columns(&self) -> &'static Columns {
        &REPLICASET_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let desired = self
            .0
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = self.0.status.as_ref();
        let current = status.map_or(0, |status| status.replicas);
        let ready = status
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0);

        vec![
            self.object_name().to_string(),
            desired.to_string(),
            current.to_string(),
            ready.to_string(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct JobRow(Job);

impl From<Job> for JobRow {
    fn from(job: Job) -> Self {
        Self(job)
    }
}

impl Columnar for JobRow {
    fn columns(&self) -> &'static Columns {
        &JOB_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let completions = self
            .0
            .spec
            .as_ref()
            .and_then(|spec| spec.completions)
            .unwrap_or(1);
        let succeeded = self
            .0
            .status
            .as_ref()
            .and_then(|status| status.succeeded)
            .unwrap_or(0);

        vec![
            self.object_name().to_string(),
            format!("{succeeded}/{completions}"),
            self.duration(),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

impl JobRow {
    fn duration(&self) -> String {
        let Some(status) = self.0.status.as_ref() else {
            return NA.to_string();
        };
        let Some(start) = status.start_time.as_ref() else {
            return NA.to_string();
        };
        let end = status
            .completion_time
            .as_ref()
            .map_or_else(k8s_openapi::jiff::Timestamp::now, |time| time.0);
        format_elapsed_seconds((end.as_second() - start.0.as_second()).max(0))
    }
}

#[derive(Debug, Clone)]
pub struct CronJobRow(CronJob);

impl From<CronJob> for CronJobRow {
    fn from(cronjob: CronJob) -> Self {
        Self(cronjob)
    }
}

impl Columnar for CronJobRow {
    fn columns(&self) -> &'static Columns {
        &CRONJOB_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let spec = self.0.spec.as_ref();
        let schedule = spec.map_or(NA, |spec| spec.schedule.as_str());
        let suspended = spec.and_then(|spec| spec.suspend).unwrap_or(false);
        let status = self.0.status.as_ref();
        let active = status
            .and_then(|status| status.active.as_ref())
            .map_or(0, Vec::len);
        let last = status
            .and_then(|status| status.last_schedule_time.as_ref())
            .map_or_else(|| NA.to_string(), |time| human_age(Some(time)));

        vec![
            self.object_name().to_string(),
            truncate(schedule, 28),
            bool_to_str(suspended),
            active.to_string(),
            last,
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}
