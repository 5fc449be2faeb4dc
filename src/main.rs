mod access;
mod cache;
mod cli;
mod config;
mod error;
#[cfg(test)]
mod fixtures;
mod format;
mod k8s;
mod logs;
mod model;
mod render;
mod resource;

use anyhow::{Context, Result, anyhow};
use cache::ResourceCache;
use clap::Parser;
use cli::{CliArgs, Command, DeleteArgs, LogsArgs, ScopeArgs, TargetArgs, WatchArgs};
use config::{RuntimeConfigSnapshot, RuntimeConfigWatcher};
use error::StreamError;
use k8s::KubeGateway;
use k8s_openapi::api::core::v1::Pod;
use logs::{LogOutcome, LogStreamer};
use model::{NamespaceScope, ResourceKind, resource_key, split_key};
use resource::{KindObject, Registry};
use std::io::Write;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const RECONCILE_TIMEOUT: Duration = Duration::from_secs(4);
const LOG_SINK_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let mut watcher = RuntimeConfigWatcher::discover();
    let settings = watcher.load_current().unwrap_or_else(|error| {
        warn!(error = %format!("{error:#}"), "runtime config unusable, using defaults");
        RuntimeConfigSnapshot::default()
    });
    if let Some(source) = settings.source.as_deref() {
        debug!(source, "runtime config loaded");
    }

    let gateway = KubeGateway::new(args.context.clone()).await?;
    info!(
        context = gateway.context(),
        cluster = gateway.cluster(),
        "connected"
    );

    match args.command {
        Command::Watch(watch_args) => watch(&gateway, watcher, settings, watch_args).await,
        Command::Logs(logs_args) => tail_logs(&gateway, &settings, logs_args).await,
        Command::Describe(target) => describe(&gateway, &settings, target).await,
        Command::Delete(delete_args) => delete(&gateway, &settings, delete_args).await,
    }
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    // stdout carries table rows and log lines
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

fn resolve_kind(settings: &RuntimeConfigSnapshot, token: &str) -> Result<ResourceKind> {
    settings
        .resolve_kind(token)
        .ok_or_else(|| {
            let known = ResourceKind::ALL.map(ResourceKind::short_token).join(", ");
            anyhow!("unknown resource kind `{token}` (expected one of: {known})")
        })
}

fn resolve_namespace_scope(scope: &ScopeArgs, gateway: &KubeGateway) -> NamespaceScope {
    if scope.all_namespaces {
        if scope.namespace.is_some() {
            warn!("both --all-namespaces and --namespace were provided, using all namespaces");
        }
        NamespaceScope::All
    } else if let Some(namespace) = &scope.namespace {
        NamespaceScope::Named(namespace.clone())
    } else {
        NamespaceScope::Named(gateway.default_namespace().to_string())
    }
}

fn cache_for(
    gateway: &KubeGateway,
    kind: ResourceKind,
    scope: NamespaceScope,
) -> Result<ResourceCache> {
    ResourceCache::new(
        &Registry::standard(),
        kind,
        scope,
        gateway.accessor(kind),
        Some(gateway.metrics()),
    )
    .with_context(|| format!("no adapter registered for {kind}"))
}

async fn watch(
    gateway: &KubeGateway,
    mut watcher: RuntimeConfigWatcher,
    mut settings: RuntimeConfigSnapshot,
    args: WatchArgs,
) -> Result<()> {
    let kind = resolve_kind(&settings, &args.kind)?;
    let scope = resolve_namespace_scope(&args.scope, gateway);
    let mut cache = cache_for(gateway, kind, scope)?;

    let refresh_override = args
        .refresh_ms
        .map(|ms| Duration::from_millis(ms.max(config::MIN_REFRESH_MS)));
    let mut refresh = refresh_override.unwrap_or(settings.refresh);
    let mut ticker = interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        kind = %cache.kind(),
        scope = %cache.scope(),
        refresh = ?refresh,
        "watching"
    );

    let mut stdout = std::io::stdout().lock();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
            _ = ticker.tick() => {
                match timeout(RECONCILE_TIMEOUT, cache.reconcile()).await {
                    Ok(Ok(())) => {
                        let data = cache.data();
                        let stamp = data
                            .last_refreshed
                            .map(|at| at.format("%H:%M:%S").to_string())
                            .unwrap_or_default();
                        writeln!(stdout, "--- {kind} ({}) {stamp}", data.scope)?;
                        for line in render::table_lines(data, args.all_rows) {
                            writeln!(stdout, "{line}")?;
                        }
                        stdout.flush()?;
                    }
                    Ok(Err(error)) => warn!(error = %error, "refresh failed, keeping last table"),
                    Err(_) => warn!(
                        timeout = ?RECONCILE_TIMEOUT,
                        "refresh timed out, keeping last table"
                    ),
                }

                match watcher.reload_if_changed() {
                    Ok(Some(reloaded)) => {
                        settings = reloaded;
                        let next = refresh_override.unwrap_or(settings.refresh);
                        if next != refresh {
                            refresh = next;
                            ticker = interval(refresh);
                            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                            ticker.reset();
                            info!(refresh = ?refresh, "refresh interval updated");
                        }
                    }
                    Ok(None) => {}
                    Err(error) => warn!(error = %format!("{error:#}"), "runtime config reload failed"),
                }
            }
        }
    }

    Ok(())
}

async fn tail_logs(
    gateway: &KubeGateway,
    settings: &RuntimeConfigSnapshot,
    args: LogsArgs,
) -> Result<()> {
    let (namespace, pod) = split_key(&args.pod);
    let namespace = namespace.unwrap_or_else(|| gateway.default_namespace());

    let container = match args.container {
        Some(container) => container,
        None => first_container(gateway, namespace, pod).await?,
    };
    let request = access::LogRequest::new(namespace, pod)
        .container(container)
        .previous(args.previous)
        .tail_lines(args.tail.unwrap_or(settings.log_tail_lines))
        .open_timeout(
            args.open_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(settings.log_open_timeout),
        );

    let streamer = LogStreamer::new(gateway.log_accessor());
    let (tx, mut rx) = mpsc::channel::<String>(LOG_SINK_BUFFER);
    let handle = streamer.logs(tx, request);

    let canceller = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted");
            canceller.cancel();
        }
    });

    let mut stdout = std::io::stdout().lock();
    while let Some(line) = rx.recv().await {
        if let Err(error) = writeln!(stdout, "{line}") {
            handle.cancel();
            return Err(error).context("failed to write log line");
        }
    }
    stdout.flush()?;

    finish_log_stream(handle.wait().await, &resource_key(Some(namespace), pod))
}

// A stream that never opened is reported, not failed.
fn finish_log_stream(outcome: Result<LogOutcome, StreamError>, pod: &str) -> Result<()> {
    match outcome.with_context(|| format!("log stream for {pod} failed"))? {
        LogOutcome::TimedOut => warn!(pod, "log stream did not open in time, nothing to show"),
        outcome => debug!(pod, ?outcome, "log stream finished"),
    }
    Ok(())
}

async fn first_container(gateway: &KubeGateway, namespace: &str, pod: &str) -> Result<String> {
    let raw = gateway
        .accessor(ResourceKind::Pods)
        .get(Some(namespace), pod)
        .await?;
    let pod_object = Pod::from_raw(raw)?;
    pod_object
        .spec
        .and_then(|spec| spec.containers.into_iter().next())
        .map(|container| container.name)
        .ok_or_else(|| anyhow!("pod {} declares no containers", resource_key(Some(namespace), pod)))
}

fn target_scope(target: &TargetArgs, gateway: &KubeGateway) -> NamespaceScope {
    NamespaceScope::Named(
        target
            .namespace
            .clone()
            .unwrap_or_else(|| gateway.default_namespace().to_string()),
    )
}

async fn describe(
    gateway: &KubeGateway,
    settings: &RuntimeConfigSnapshot,
    target: TargetArgs,
) -> Result<()> {
    let kind = resolve_kind(settings, &target.kind)?;
    let cache = cache_for(gateway, kind, target_scope(&target, gateway))?;
    let yaml = cache
        .describe(&target.key)
        .await
        .with_context(|| format!("failed to describe {kind} {}", target.key))?;
    print!("{yaml}");
    Ok(())
}

async fn delete(
    gateway: &KubeGateway,
    settings: &RuntimeConfigSnapshot,
    args: DeleteArgs,
) -> Result<()> {
    let kind = resolve_kind(settings, &args.target.kind)?;
    let cache = cache_for(gateway, kind, target_scope(&args.target, gateway))?;
    cache
        .delete(&args.target.key, args.cascade, args.force)
        .await
        .with_context(|| format!("failed to delete {kind} {}", args.target.key))?;
    println!("{kind} {} deleted", args.target.key);
    Ok(())
}
