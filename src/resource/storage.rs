use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

use super::{Columnar, Columns};
use crate::format::{MISSING, human_age, join_or_missing, missing};
use crate::model::{ResourceKind, Row, resource_key};

pub static PVC_COLUMNS: Columns = Columns {
    kind: ResourceKind::PersistentVolumeClaims,
    names: &[
        "NAME",
        "STATUS",
        "VOLUME",
        "CAPACITY",
        "ACCESS MODES",
        "STORAGECLASS",
        "AGE",
    ],
    volatile: Some("AGE"),
};

pub static PV_COLUMNS: Columns = Columns {
    kind: ResourceKind::PersistentVolumes,
    names: &[
        "NAME",
        "CAPACITY",
        "ACCESS MODES",
        "RECLAIM POLICY",
        "STATUS",
        "CLAIM",
        "STORAGECLASS",
        "REASON",
        "AGE",
    ],
    volatile: Some("AGE"),
};

fn access_modes(modes: Option<&Vec<String>>) -> String {
    join_or_missing(modes.into_iter().flatten().map(|mode| match mode.as_str() {
        "ReadWriteOnce" => "RWO",
        "ReadOnlyMany" => "ROX",
        "ReadWriteMany" => "RWX",
        "ReadWriteOncePod" => "RWOP",
        other => other,
    }))
}

fn storage(capacity: Option<&BTreeMap<String, Quantity>>) -> String {
    missing(
        capacity
            .and_then(|capacity| capacity.get("storage"))
            .map(|quantity| quantity.0.as_str()),
    )
}

#[derive(Debug, Clone)]
pub struct PersistentVolumeClaimRow(PersistentVolumeClaim);

impl From<PersistentVolumeClaim> for PersistentVolumeClaimRow {
    fn from(claim: PersistentVolumeClaim) -> Self {
        Self(claim)
    }
}

impl Columnar for PersistentVolumeClaimRow {
    fn columns(&self) -> &'static Columns {
        &PVC_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let spec = self.0.spec.as_ref();
        let status = self.0.status.as_ref();
        let bound = status.and_then(|status| status.phase.as_deref()) == Some("Bound");

        let (capacity, modes) = if bound {
            (
                storage(status.and_then(|status| status.capacity.as_ref())),
                access_modes(status.and_then(|status| status.access_modes.as_ref())),
            )
        } else {
            (MISSING.to_string(), MISSING.to_string())
        };

        vec![
            self.object_name().to_string(),
            missing(status.and_then(|status| status.phase.as_deref())),
            missing(spec.and_then(|spec| spec.volume_name.as_deref())),
            capacity,
            modes,
            missing(spec.and_then(|spec| spec.storage_class_name.as_deref())),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct PersistentVolumeRow(PersistentVolume);

impl From<PersistentVolume> for PersistentVolumeRow {
    fn from(volume: PersistentVolume) -> Self {
        Self(volume)
    }
}

impl Columnar for PersistentVolumeRow {
    fn columns(&self) -> &'static Columns {
        &PV_COLUMNS
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.0.metadata
    }

    fn cells(&self) -> Row {
        let spec = self.0.spec.as_ref();
        let status = self.0.status.as_ref();
        let claim = spec
            .and_then(|spec| spec.claim_ref.as_ref())
            .and_then(|claim| {
                claim
                    .name
                    .as_deref()
                    .map(|name| resource_key(claim.namespace.as_deref(), name))
            });

        vec![
            self.object_name().to_string(),
            storage(spec.and_then(|spec| spec.capacity.as_ref())),
            access_modes(spec.and_then(|spec| spec.access_modes.as_ref())),
            missing(spec.and_then(|spec| spec.persistent_volume_reclaim_policy.as_deref())),
            missing(status.and_then(|status| status.phase.as_deref())),
            missing(claim.as_deref()),
            missing(spec.and_then(|spec| spec.storage_class_name.as_deref())),
            missing(status.and_then(|status| status.reason.as_deref())),
            human_age(self.0.metadata.creation_timestamp.as_ref()),
        ]
    }
}
