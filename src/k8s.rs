use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{AsyncBufReadExt, StreamExt, stream};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
    Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::ClusterRole;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{DeleteParams, ListParams, LogParams, PropagationPolicy};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, ObjectList};
use kube::{Api, Client, Config, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::access::{Accessor, LogAccessor, LogLines, LogRequest, MetricsSource};
use crate::error::AccessError;
use crate::format::{parse_pod_metrics_usage, parse_usage_from_value};
use crate::model::{NamespaceScope, ResourceKind, resource_key};
use crate::resource::{RawObject, Usage};

const LOG_PUMP_BUFFER: usize = 64;
const LIST_PAGE_SIZE: u32 = 500;

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new(context: Option<String>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context is unavailable in this environment");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = context
            .or_else(|| {
                kubeconfig
                    .as_ref()
                    .and_then(|cfg| cfg.current_context.clone())
            })
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn accessor(&self, kind: ResourceKind) -> Arc<dyn Accessor> {
        let client = self.client.clone();
        match kind {
            ResourceKind::Pods => namespaced::<Pod>(client, kind),
            ResourceKind::Deployments => namespaced::<Deployment>(client, kind),
            ResourceKind::StatefulSets => namespaced::<StatefulSet>(client, kind),
            ResourceKind::DaemonSets => namespaced::<DaemonSet>(client, kind),
            ResourceKind::ReplicaSets => namespaced::<ReplicaSet>(client, kind),
            ResourceKind::Jobs => namespaced::<Job>(client, kind),
            ResourceKind::CronJobs => namespaced::<CronJob>(client, kind),
            ResourceKind::Services => namespaced::<Service>(client, kind),
            ResourceKind::Endpoints => namespaced::<Endpoints>(client, kind),
            ResourceKind::Ingresses => namespaced::<Ingress>(client, kind),
            ResourceKind::ConfigMaps => namespaced::<ConfigMap>(client, kind),
            ResourceKind::Secrets => namespaced::<Secret>(client, kind),
            ResourceKind::PersistentVolumeClaims => {
                namespaced::<PersistentVolumeClaim>(client, kind)
            }
            ResourceKind::ServiceAccounts => namespaced::<ServiceAccount>(client, kind),
            ResourceKind::Nodes => cluster::<Node>(client, kind),
            ResourceKind::Namespaces => cluster::<Namespace>(client, kind),
            ResourceKind::PersistentVolumes => cluster::<PersistentVolume>(client, kind),
            ResourceKind::ClusterRoles => cluster::<ClusterRole>(client, kind),
        }
    }

    pub fn log_accessor(&self) -> Arc<dyn LogAccessor> {
        Arc::new(PodLogAccessor {
            client: self.client.clone(),
        })
    }

    pub fn metrics(&self) -> Arc<dyn MetricsSource> {
        Arc::new(KubeMetrics {
            client: self.client.clone(),
        })
    }
}

pub trait KubeObject:
    Resource<DynamicType = ()>
    + Clone
    + Debug
    + DeserializeOwned
    + Into<RawObject>
    + Send
    + Sync
    + 'static
{
}

impl<K> KubeObject for K where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + DeserializeOwned
        + Into<RawObject>
        + Send
        + Sync
        + 'static
{
}

fn namespaced<K>(client: Client, kind: ResourceKind) -> Arc<dyn Accessor>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    Arc::new(NamespacedAccessor::<K> {
        client,
        kind,
        marker: PhantomData,
    })
}

fn cluster<K>(client: Client, kind: ResourceKind) -> Arc<dyn Accessor>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    Arc::new(ClusterAccessor::<K> {
        client,
        kind,
        marker: PhantomData,
    })
}

pub struct NamespacedAccessor<K> {
    client: Client,
    kind: ResourceKind,
    marker: PhantomData<fn() -> K>,
}

impl<K> NamespacedAccessor<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    fn api(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    fn require_namespace<'a>(
        &self,
        verb: &'static str,
        namespace: Option<&'a str>,
        name: &str,
    ) -> Result<&'a str, AccessError> {
        namespace
            .filter(|namespace| !namespace.is_empty())
            .ok_or_else(|| AccessError::MissingNamespace {
                verb,
                kind: self.kind,
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl<K> Accessor for NamespacedAccessor<K>
where
    K: KubeObject + Resource<Scope = NamespaceResourceScope>,
{
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn get(&self, namespace: Option<&str>, name: &str) -> Result<RawObject, AccessError> {
        let namespace = self.require_namespace("get", namespace, name)?;
        let object = self
            .api(Some(namespace))
            .get(name)
            .await
            .map_err(|error| AccessError::api("get", target(self.kind, Some(namespace), name), error))?;
        Ok(object.into())
    }

    async fn list(&self, scope: &NamespaceScope) -> Result<Vec<RawObject>, AccessError> {
        let api = &self.api(scope.namespace());
        let items = list_all(|params| async move { api.list(&params).await })
            .await
            .map_err(|error| AccessError::api("list", format!("{} in {scope}", self.kind), error))?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    async fn delete(
        &self,
        namespace: Option<&str>,
        name: &str,
        cascade: bool,
        force: bool,
    ) -> Result<(), AccessError> {
        let namespace = self.require_namespace("delete", namespace, name)?;
        self.api(Some(namespace))
            .delete(name, &delete_params(cascade, force))
            .await
            .map_err(|error| {
                AccessError::api("delete", target(self.kind, Some(namespace), name), error)
            })?;
        Ok(())
    }
}

pub struct ClusterAccessor<K> {
    client: Client,
    kind: ResourceKind,
    marker: PhantomData<fn() -> K>,
}

#[async_trait]
impl<K> Accessor for ClusterAccessor<K>
where
    K: KubeObject + Resource<Scope = ClusterResourceScope>,
{
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn get(&self, _namespace: Option<&str>, name: &str) -> Result<RawObject, AccessError> {
        let api: Api<K> = Api::all(self.client.clone());
        let object = api
            .get(name)
            .await
            .map_err(|error| AccessError::api("get", target(self.kind, None, name), error))?;
        Ok(object.into())
    }

    async fn list(&self, _scope: &NamespaceScope) -> Result<Vec<RawObject>, AccessError> {
        let api: &Api<K> = &Api::all(self.client.clone());
        let items = list_all(|params| async move { api.list(&params).await })
            .await
            .map_err(|error| AccessError::api("list", self.kind.to_string(), error))?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    async fn delete(
        &self,
        _namespace: Option<&str>,
        name: &str,
        cascade: bool,
        force: bool,
    ) -> Result<(), AccessError> {
        let api: Api<K> = Api::all(self.client.clone());
        api.delete(name, &delete_params(cascade, force))
            .await
            .map_err(|error| AccessError::api("delete", target(self.kind, None, name), error))?;
        Ok(())
    }
}

struct PodLogAccessor {
    client: Client,
}

#[async_trait]
impl LogAccessor for PodLogAccessor {
    // The reader task stops once the lines are dropped or the open is abandoned.
    async fn open_log_stream(&self, request: &LogRequest) -> Result<LogLines, AccessError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);
        let params = log_params(request);
        let pod = request.pod.clone();
        let target = request.target();
        let (mut opened_tx, opened_rx) = oneshot::channel::<Result<(), AccessError>>();
        let (line_tx, line_rx) = mpsc::channel::<std::io::Result<String>>(LOG_PUMP_BUFFER);

        tokio::spawn(async move {
            let opened = tokio::select! {
                opened = pods.log_stream(&pod, &params) => opened,
                () = opened_tx.closed() => return,
            };
            let reader = match opened {
                Ok(reader) => reader,
                Err(error) => {
                    let _ = opened_tx.send(Err(AccessError::api("stream logs of", target, error)));
                    return;
                }
            };
            if opened_tx.send(Ok(())).is_err() {
                return;
            }

            let mut lines = std::pin::pin!(reader.lines());
            loop {
                let line = tokio::select! {
                    line = lines.next() => line,
                    () = line_tx.closed() => break,
                };
                let Some(line) = line else {
                    break;
                };
                let failed = line.is_err();
                if line_tx.send(line).await.is_err() || failed {
                    break;
                }
            }
            debug!(stream = %target, "released kube log connection");
        });

        match opened_rx.await {
            Ok(opened) => opened?,
            Err(_) => {
                return Err(AccessError::Transport(std::io::Error::other(
                    "log reader stopped before the stream opened",
                )));
            }
        }

        Ok(stream::unfold(line_rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        })
        .boxed())
    }
}

struct KubeMetrics {
    client: Client,
}

#[async_trait]
impl MetricsSource for KubeMetrics {
    async fn pod_metrics(
        &self,
        scope: &NamespaceScope,
    ) -> Result<HashMap<String, Usage>, AccessError> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let api: Api<DynamicObject> = match scope.namespace() {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };

        let api = &api;
        let metrics = list_all(|params| async move { api.list(&params).await })
            .await
            .map_err(|error| AccessError::api("list", "pod metrics", error))?;
        Ok(metrics
            .into_iter()
            .map(|metric| {
                let (cpu_millicores, memory_bytes) = parse_pod_metrics_usage(&metric.data);
                let key = resource_key(metric.namespace().as_deref(), &metric.name_any());
                (
                    key,
                    Usage {
                        cpu_millicores,
                        memory_bytes,
                    },
                )
            })
            .collect())
    }

    async fn node_metrics(&self) -> Result<HashMap<String, Usage>, AccessError> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "nodes");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);

        let api = &api;
        let metrics = list_all(|params| async move { api.list(&params).await })
            .await
            .map_err(|error| AccessError::api("list", "node metrics", error))?;
        Ok(metrics
            .into_iter()
            .map(|metric| {
                let (cpu_millicores, memory_bytes) = parse_usage_from_value(&metric.data["usage"]);
                (
                    metric.name_any(),
                    Usage {
                        cpu_millicores,
                        memory_bytes,
                    },
                )
            })
            .collect())
    }
}

fn target(kind: ResourceKind, namespace: Option<&str>, name: &str) -> String {
    format!("{kind} {}", resource_key(namespace, name))
}

fn list_params() -> ListParams {
    ListParams::default().limit(LIST_PAGE_SIZE)
}

// A truncated list would read as deletions to the cache, so every page is fetched.
async fn list_all<K, E, F, Fut>(mut fetch: F) -> Result<Vec<K>, E>
where
    K: Clone,
    F: FnMut(ListParams) -> Fut,
    Fut: Future<Output = Result<ObjectList<K>, E>>,
{
    let mut items = Vec::new();
    let mut params = list_params();
    loop {
        let page = fetch(params).await?;
        items.extend(page.items);
        match page.metadata.continue_.filter(|token| !token.is_empty()) {
            Some(token) => params = list_params().continue_token(&token),
            None => return Ok(items),
        }
    }
}

fn delete_params(cascade: bool, force: bool) -> DeleteParams {
    DeleteParams {
        propagation_policy: Some(if cascade {
            PropagationPolicy::Background
        } else {
            PropagationPolicy::Orphan
        }),
        grace_period_seconds: force.then_some(0),
        ..DeleteParams::default()
    }
}

fn log_params(request: &LogRequest) -> LogParams {
    LogParams {
        container: request.container.clone(),
        follow: true,
        previous: request.previous,
        tail_lines: request.tail_lines,
        ..LogParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::{LIST_PAGE_SIZE, delete_params, list_all, log_params, target};
    use crate::access::LogRequest;
    use crate::model::ResourceKind;
    use kube::api::PropagationPolicy;
    use kube::core::ObjectList;
    use serde_json::{Value, json};
    use std::collections::VecDeque;

    fn page(names: &[&str], next: Option<&str>) -> ObjectList<Value> {
        let items = names
            .iter()
            .map(|name| json!({ "metadata": { "name": name } }))
            .collect::<Vec<_>>();
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "List",
            "metadata": { "continue": next },
            "items": items,
        }))
        .unwrap()
    }

    fn names(items: &[Value]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|item| item["metadata"]["name"].as_str())
            .collect()
    }

    #[tokio::test]
    async fn list_follows_continue_tokens_to_the_last_page() {
        let mut pages = VecDeque::from([
            page(&["fred", "blee"], Some("page-2")),
            page(&["zorg"], Some("page-3")),
            page(&["duh"], Some("")),
        ]);
        let mut seen = Vec::new();

        let items = list_all(|params| {
            seen.push((params.continue_token.clone(), params.limit));
            let next = pages.pop_front();
            async move { next.ok_or_else(|| std::io::Error::other("no more pages")) }
        })
        .await
        .unwrap();

        assert_eq!(names(&items), vec!["fred", "blee", "zorg", "duh"]);
        assert_eq!(
            seen,
            vec![
                (None, Some(LIST_PAGE_SIZE)),
                (Some("page-2".to_string()), Some(LIST_PAGE_SIZE)),
                (Some("page-3".to_string()), Some(LIST_PAGE_SIZE)),
            ]
        );
    }

    #[tokio::test]
    async fn failed_page_fails_the_whole_list() {
        let mut pages = VecDeque::from([Ok(page(&["fred"], Some("page-2"))), Err("gone")]);

        let result = list_all(|_| {
            let next = pages.pop_front().unwrap_or(Err("exhausted"));
            async move { next }
        })
        .await;

        assert_eq!(result.err(), Some("gone"));
    }

    #[test]
    fn cascade_and_force_map_to_delete_params() {
        let params = delete_params(true, false);
        assert!(matches!(
            params.propagation_policy,
            Some(PropagationPolicy::Background)
        ));
        assert_eq!(params.grace_period_seconds, None);

        let params = delete_params(false, true);
        assert!(matches!(
            params.propagation_policy,
            Some(PropagationPolicy::Orphan)
        ));
        assert_eq!(params.grace_period_seconds, Some(0));
    }

    #[test]
    fn log_params_follow_the_request() {
        let request = LogRequest::new("blee", "fred")
            .container("sidecar")
            .tail_lines(50)
            .previous(true);
        let params = log_params(&request);
        assert!(params.follow);
        assert!(params.previous);
        assert_eq!(params.tail_lines, Some(50));
        assert_eq!(params.container.as_deref(), Some("sidecar"));
    }

    #[test]
    fn error_targets_name_kind_and_key() {
        assert_eq!(target(ResourceKind::Pods, Some("blee"), "fred"), "Pods blee/fred");
        assert_eq!(target(ResourceKind::Nodes, None, "fred"), "Nodes fred");
    }
}
