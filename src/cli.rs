use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kview",
    version,
    about = "Continuously reconciled Kubernetes tables and live container logs."
)]
pub struct CliArgs {
    /// kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Poll one resource kind and print added, modified and unchanged rows
    Watch(WatchArgs),
    /// Tail one container's logs until interrupted
    Logs(LogsArgs),
    /// Print one object as YAML
    Describe(TargetArgs),
    /// Delete one object
    Delete(DeleteArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ScopeArgs {
    /// Namespace to watch (defaults to the context namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Watch all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Resource kind or alias (po, deploy, svc, no, ...)
    pub kind: String,

    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Refresh interval in milliseconds; overrides the config file
    #[arg(long)]
    pub refresh_ms: Option<u64>,

    /// Print unchanged rows too
    #[arg(long)]
    pub all_rows: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LogsArgs {
    /// Pod as namespace/name, or a bare name in the context namespace
    pub pod: String,

    /// Container name (defaults to the first declared container)
    #[arg(short, long)]
    pub container: Option<String>,

    /// Show logs of the previous container instance
    #[arg(short, long)]
    pub previous: bool,

    /// Number of recent lines to start from; overrides the config file
    #[arg(long)]
    pub tail: Option<i64>,

    /// Stream open timeout in milliseconds; overrides the config file
    #[arg(long)]
    pub open_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Resource kind or alias
    pub kind: String,

    /// Resource key: namespace/name, or a bare name
    pub key: String,

    /// Namespace used for bare keys (defaults to the context namespace)
    #[arg(short, long)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Delete dependents in the background instead of orphaning them
    #[arg(long)]
    pub cascade: bool,

    /// Skip the graceful termination period
    #[arg(long)]
    pub force: bool,
}
