use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::ClusterRole;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::access::{Accessor, LogAccessor, LogLines, LogRequest, MetricsSource};
use crate::error::{AccessError, AdaptationError};
use crate::model::{NamespaceScope, ResourceKind, Row, resource_key};
use crate::resource::{Columnar, Columns, MetricsNeed, RawObject, Registry, Usage};

pub const CREATED: &str = "2024-01-01T00:00:00Z";

pub fn test_time() -> Time {
    Time(CREATED.parse().unwrap())
}

fn build<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

fn meta(name: &str) -> Value {
    json!({ "name": name, "namespace": "blee", "creationTimestamp": CREATED })
}

fn cluster_meta(name: &str) -> Value {
    json!({ "name": name, "creationTimestamp": CREATED })
}

fn template() -> Value {
    json!({
        "metadata": { "labels": { "app": "fred" } },
        "spec": { "containers": [{ "name": "fred", "image": "fred:1" }] }
    })
}

fn selector() -> Value {
    json!({ "matchLabels": { "app": "fred" } })
}

pub fn k8s_pod() -> Pod {
    build(json!({
        "metadata": meta("fred"),
        "spec": {
            "nodeName": "node-1",
            "containers": [{
                "name": "fred",
                "image": "fred:1",
                "resources": { "requests": { "cpu": "100m", "memory": "64Mi" } }
            }]
        },
        "status": {
            "phase": "Running",
            "podIP": "10.0.0.1",
            "qosClass": "Burstable",
            "containerStatuses": [{
                "name": "fred",
                "image": "fred:1",
                "imageID": "docker://fred",
                "ready": true,
                "restartCount": 0,
                "state": { "running": { "startedAt": CREATED } }
            }]
        }
    }))
}

pub fn k8s_node() -> Node {
    build(json!({
        "metadata": {
            "name": "fred",
            "creationTimestamp": CREATED,
            "labels": { "node-role.kubernetes.io/control-plane": "" }
        },
        "status": {
            "allocatable": { "cpu": "4", "memory": "4Gi" },
            "addresses": [{ "type": "InternalIP", "address": "1.1.1.1" }],
            "conditions": [{ "type": "Ready", "status": "True" }],
            "nodeInfo": {
                "architecture": "amd64",
                "bootID": "boot",
                "containerRuntimeVersion": "containerd://1.7.0",
                "kernelVersion": "6.1.0",
                "kubeProxyVersion": "v1.30.0",
                "kubeletVersion": "v1.30.0",
                "machineID": "machine",
                "operatingSystem": "linux",
                "osImage": "Debian",
                "systemUUID": "uuid"
            }
        }
    }))
}

pub fn k8s_deployment() -> Deployment {
    build(json!({
        "metadata": meta("fred"),
        "spec": { "replicas": 3, "selector": selector(), "template": template() },
        "status": { "replicas": 3, "updatedReplicas": 2, "availableReplicas": 1 }
    }))
}

pub fn k8s_statefulset() -> StatefulSet {
    build(json!({
        "metadata": meta("fred"),
        "spec": {
            "replicas": 2,
            "serviceName": "fred",
            "selector": selector(),
            "template": template()
        },
        "status": { "replicas": 1 }
    }))
}

pub fn k8s_daemonset() -> DaemonSet {
    let mut pod_template = template();
    pod_template["spec"]["nodeSelector"] = json!({ "disk": "ssd" });
    build(json!({
        "metadata": meta("fred"),
        "spec": { "selector": selector(), "template": pod_template },
        "status": {
            "desiredNumberScheduled": 3,
            "currentNumberScheduled": 3,
            "numberMisscheduled": 0,
            "numberReady": 2,
            "updatedNumberScheduled": 3,
            "numberAvailable": 2
        }
    }))
}

pub fn k8s_replicaset() -> ReplicaSet {
    build(json!({
        "metadata": meta("fred"),
        "spec": { "replicas": 2, "selector": selector() },
        "status": { "replicas": 2, "readyReplicas": 1 }
    }))
}

pub fn k8s_job() -> Job {
    build(json!({
        "metadata": meta("fred"),
        "spec": { "completions": 1, "template": template() },
        "status": {
            "succeeded": 1,
            "startTime": CREATED,
            "completionTime": "2024-01-01T00:01:00Z"
        }
    }))
}

pub fn k8s_cronjob() -> CronJob {
    build(json!({
        "metadata": meta("fred"),
        "spec": {
            "schedule": "*/5 * * * *",
            "suspend": false,
            "jobTemplate": { "spec": { "template": template() } }
        },
        "status": { "active": [{ "name": "fred-1", "namespace": "blee" }] }
    }))
}

pub fn k8s_service() -> Service {
    build(json!({
        "metadata": meta("fred"),
        "spec": {
            "type": "NodePort",
            "clusterIP": "10.96.0.10",
            "ports": [
                { "port": 80, "nodePort": 30080, "protocol": "TCP" },
                { "port": 53, "protocol": "UDP" }
            ]
        }
    }))
}

pub fn k8s_endpoints() -> Endpoints {
    build(json!({
        "metadata": meta("fred"),
        "subsets": [{
            "addresses": [{ "ip": "1.1.1.1" }],
            "ports": [{ "port": 80, "protocol": "TCP" }]
        }]
    }))
}

pub fn k8s_ingress() -> Ingress {
    build(json!({
        "metadata": meta("fred"),
        "spec": { "rules": [{ "host": "a.example" }, { "host": "b.example" }] },
        "status": { "loadBalancer": { "ingress": [{ "ip": "1.2.3.4" }] } }
    }))
}

pub fn k8s_configmap() -> ConfigMap {
    build(json!({
        "metadata": meta("fred"),
        "data": { "a": "1" },
        "binaryData": { "b": "Ymx1ZQ==" }
    }))
}

pub fn k8s_secret() -> Secret {
    build(json!({
        "metadata": meta("fred"),
        "type": "Opaque",
        "data": { "password": "aHVudGVyMg==" }
    }))
}

pub fn k8s_service_account() -> ServiceAccount {
    build(json!({
        "metadata": meta("fred"),
        "secrets": [{ "name": "fred-token" }]
    }))
}

pub fn k8s_pvc() -> PersistentVolumeClaim {
    build(json!({
        "metadata": meta("fred"),
        "spec": {
            "volumeName": "pv-fred",
            "storageClassName": "standard",
            "accessModes": ["ReadWriteOnce", "ReadWriteMany"]
        },
        "status": {
            "phase": "Bound",
            "capacity": { "storage": "1Gi" },
            "accessModes": ["ReadWriteOnce", "ReadWriteMany"]
        }
    }))
}

pub fn k8s_pv() -> PersistentVolume {
    build(json!({
        "metadata": cluster_meta("pv-fred"),
        "spec": {
            "capacity": { "storage": "1Gi" },
            "accessModes": ["ReadWriteOnce"],
            "persistentVolumeReclaimPolicy": "Retain",
            "storageClassName": "standard",
            "claimRef": { "namespace": "blee", "name": "fred" }
        },
        "status": { "phase": "Bound" }
    }))
}

pub fn k8s_namespace() -> Namespace {
    build(json!({
        "metadata": cluster_meta("blee"),
        "status": { "phase": "Active" }
    }))
}

pub fn k8s_cluster_role() -> ClusterRole {
    build(json!({ "metadata": cluster_meta("view") }))
}

pub fn one_of_each() -> Vec<(ResourceKind, RawObject)> {
    vec![
        (ResourceKind::Pods, k8s_pod().into()),
        (ResourceKind::Deployments, k8s_deployment().into()),
        (ResourceKind::StatefulSets, k8s_statefulset().into()),
        (ResourceKind::DaemonSets, k8s_daemonset().into()),
        (ResourceKind::ReplicaSets, k8s_replicaset().into()),
        (ResourceKind::Jobs, k8s_job().into()),
        (ResourceKind::CronJobs, k8s_cronjob().into()),
        (ResourceKind::Services, k8s_service().into()),
        (ResourceKind::Endpoints, k8s_endpoints().into()),
        (ResourceKind::Ingresses, k8s_ingress().into()),
        (ResourceKind::ConfigMaps, k8s_configmap().into()),
        (ResourceKind::Secrets, k8s_secret().into()),
        (ResourceKind::PersistentVolumeClaims, k8s_pvc().into()),
        (ResourceKind::ServiceAccounts, k8s_service_account().into()),
        (ResourceKind::Nodes, k8s_node().into()),
        (ResourceKind::Namespaces, k8s_namespace().into()),
        (ResourceKind::PersistentVolumes, k8s_pv().into()),
        (ResourceKind::ClusterRoles, k8s_cluster_role().into()),
    ]
}

pub fn transport_error() -> AccessError {
    AccessError::Transport(std::io::Error::other("connection refused"))
}

pub static SCRIPTED_COLUMNS: Columns = Columns {
    kind: ResourceKind::Pods,
    names: &["NAME", "READY", "STATUS", "RESTARTS"],
    volatile: None,
};

pub static SCRIPTED_AGED_COLUMNS: Columns = Columns {
    kind: ResourceKind::Deployments,
    names: &["NAME", "STATUS", "AGE"],
    volatile: Some("AGE"),
};

#[derive(Debug)]
struct ScriptedRow {
    columns: &'static Columns,
    metadata: ObjectMeta,
    cells: Row,
}

impl Columnar for ScriptedRow {
    fn columns(&self) -> &'static Columns {
        self.columns
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn cells(&self) -> Row {
        self.cells.clone()
    }
}

fn scripted_row(
    columns: &'static Columns,
    raw: RawObject,
) -> Result<Box<dyn Columnar>, AdaptationError> {
    let mut value = match raw {
        RawObject::Untyped(value) => value,
        other => {
            return Err(AdaptationError::KindMismatch {
                expected: columns.kind,
                found: other.label(),
            });
        }
    };
    let malformed = |source| AdaptationError::Malformed {
        kind: columns.kind,
        source,
    };
    let metadata = serde_json::from_value(value["metadata"].take()).map_err(malformed)?;
    let cells = serde_json::from_value(value["cells"].take()).map_err(malformed)?;
    Ok(Box::new(ScriptedRow {
        columns,
        metadata,
        cells,
    }))
}

fn scripted_pod(raw: RawObject) -> Result<Box<dyn Columnar>, AdaptationError> {
    scripted_row(&SCRIPTED_COLUMNS, raw)
}

fn scripted_deployment(raw: RawObject) -> Result<Box<dyn Columnar>, AdaptationError> {
    scripted_row(&SCRIPTED_AGED_COLUMNS, raw)
}

pub fn scripted_registry() -> Registry {
    let mut registry = Registry::default();
    registry.register(&SCRIPTED_COLUMNS, MetricsNeed::None, scripted_pod);
    registry.register(&SCRIPTED_AGED_COLUMNS, MetricsNeed::None, scripted_deployment);
    registry
}

pub fn scripted(namespace: &str, name: &str, cells: &[&str]) -> RawObject {
    RawObject::Untyped(json!({
        "metadata": { "name": name, "namespace": namespace },
        "cells": cells,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub namespace: Option<String>,
    pub name: String,
    pub cascade: bool,
    pub force: bool,
}

pub struct ScriptedAccessor {
    kind: ResourceKind,
    lists: Mutex<VecDeque<Result<Vec<RawObject>, AccessError>>>,
    objects: Mutex<HashMap<String, RawObject>>,
    deletes: Mutex<Vec<DeleteCall>>,
    list_calls: AtomicUsize,
}

impl ScriptedAccessor {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            lists: Mutex::new(VecDeque::new()),
            objects: Mutex::new(HashMap::new()),
            deletes: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_list(&self, result: Result<Vec<RawObject>, AccessError>) -> &Self {
        self.lists.lock().unwrap().push_back(result);
        self
    }

    pub fn insert(&self, key: &str, object: RawObject) -> &Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), object);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> Vec<DeleteCall> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Accessor for ScriptedAccessor {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<RawObject, AccessError> {
        self.objects
            .lock()
            .unwrap()
            .get(&resource_key(namespace, name))
            .cloned()
            .ok_or_else(|| {
                AccessError::Transport(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{name} not found"),
                ))
            })
    }

    async fn list(&self, _scope: &NamespaceScope) -> Result<Vec<RawObject>, AccessError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.lists
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete(
        &self,
        namespace: Option<&str>,
        name: &str,
        cascade: bool,
        force: bool,
    ) -> Result<(), AccessError> {
        self.deletes.lock().unwrap().push(DeleteCall {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            cascade,
            force,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMetrics {
    pub pods: HashMap<String, Usage>,
    pub nodes: HashMap<String, Usage>,
    pub unavailable: bool,
}

#[async_trait]
impl MetricsSource for FakeMetrics {
    async fn pod_metrics(
        &self,
        _scope: &NamespaceScope,
    ) -> Result<HashMap<String, Usage>, AccessError> {
        if self.unavailable {
            return Err(transport_error());
        }
        Ok(self.pods.clone())
    }

    async fn node_metrics(&self) -> Result<HashMap<String, Usage>, AccessError> {
        if self.unavailable {
            return Err(transport_error());
        }
        Ok(self.nodes.clone())
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub enum LogScript {
    Pending,
    Refused,
    Lines(Vec<String>),
    Hang(Vec<String>),
    Broken(Vec<String>),
    Endless,
}

pub struct FakeLogs {
    script: LogScript,
    open_dropped: Arc<AtomicBool>,
    stream_dropped: Arc<AtomicBool>,
    requests: Mutex<Vec<LogRequest>>,
}

impl FakeLogs {
    pub fn new(script: LogScript) -> Self {
        Self {
            script,
            open_dropped: Arc::new(AtomicBool::new(false)),
            stream_dropped: Arc::new(AtomicBool::new(false)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn open_abandoned(&self) -> bool {
        self.open_dropped.load(Ordering::SeqCst)
    }

    pub fn stream_released(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<LogRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[async_trait]
impl LogAccessor for FakeLogs {
    async fn open_log_stream(&self, request: &LogRequest) -> Result<LogLines, AccessError> {
        self.requests.lock().unwrap().push(request.clone());

        let lines: LogLines = match self.script.clone() {
            LogScript::Pending => {
                let _abandoned = DropFlag(self.open_dropped.clone());
                return std::future::pending().await;
            }
            LogScript::Refused => return Err(transport_error()),
            LogScript::Lines(lines) => stream::iter(lines.into_iter().map(Ok)).boxed(),
            LogScript::Hang(lines) => stream::iter(lines.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed(),
            LogScript::Broken(lines) => stream::iter(lines.into_iter().map(Ok))
                .chain(stream::once(async {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "connection reset",
                    ))
                }))
                .boxed(),
            LogScript::Endless => stream::iter(0u64..).map(|n| Ok(format!("line {n}"))).boxed(),
        };

        let released = DropFlag(self.stream_dropped.clone());
        Ok(lines
            .map(move |line| {
                let _held = &released;
                line
            })
            .boxed())
    }
}
