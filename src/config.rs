use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::access::{DEFAULT_LOG_OPEN_TIMEOUT, DEFAULT_LOG_TAIL_LINES};
use crate::model::ResourceKind;

pub const DEFAULT_REFRESH_MS: u64 = 2_000;
pub const MIN_REFRESH_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfigSnapshot {
    pub source: Option<String>,
    pub refresh: Duration,
    pub log_open_timeout: Duration,
    pub log_tail_lines: i64,
    pub aliases: HashMap<String, ResourceKind>,
}

impl Default for RuntimeConfigSnapshot {
    fn default() -> Self {
        Self {
            source: None,
            refresh: Duration::from_millis(DEFAULT_REFRESH_MS),
            log_open_timeout: DEFAULT_LOG_OPEN_TIMEOUT,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
            aliases: HashMap::new(),
        }
    }
}

impl RuntimeConfigSnapshot {
    pub fn resolve_kind(&self, token: &str) -> Option<ResourceKind> {
        self.aliases
            .get(&token.trim().to_ascii_lowercase())
            .copied()
            .or_else(|| ResourceKind::from_token(token))
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfigWatcher {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct KviewConfigFile {
    #[serde(default)]
    refresh_ms: Option<u64>,
    #[serde(default)]
    log_open_timeout_ms: Option<u64>,
    #[serde(default)]
    log_tail_lines: Option<i64>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

impl RuntimeConfigWatcher {
    pub fn discover() -> Self {
        Self {
            path: discover_config_path(),
            modified: None,
        }
    }

    #[cfg(test)]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            modified: None,
        }
    }

    pub fn load_current(&mut self) -> Result<RuntimeConfigSnapshot> {
        let Some(path) = self.path.clone() else {
            return Ok(RuntimeConfigSnapshot::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read runtime config {}", path.display()))?;
        let parsed: KviewConfigFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse runtime config {}", path.display()))?;
        self.modified = fs::metadata(&path)
            .ok()
            .and_then(|meta| meta.modified().ok());

        let mut aliases = HashMap::new();
        for (alias, token) in parsed.aliases {
            match ResourceKind::from_token(&token) {
                Some(kind) => {
                    aliases.insert(alias.trim().to_ascii_lowercase(), kind);
                }
                None => warn!(alias, token, "ignoring alias for unknown resource kind"),
            }
        }

        Ok(RuntimeConfigSnapshot {
            source: Some(path.display().to_string()),
            refresh: Duration::from_millis(
                parsed
                    .refresh_ms
                    .unwrap_or(DEFAULT_REFRESH_MS)
                    .max(MIN_REFRESH_MS),
            ),
            log_open_timeout: parsed
                .log_open_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LOG_OPEN_TIMEOUT),
            log_tail_lines: parsed
                .log_tail_lines
                .filter(|lines| *lines > 0)
                .unwrap_or(DEFAULT_LOG_TAIL_LINES),
            aliases,
        })
    }

    pub fn reload_if_changed(&mut self) -> Result<Option<RuntimeConfigSnapshot>> {
        let Some(current_path) = self.path.clone() else {
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        };

        if !current_path.exists() {
            self.path = discover_config_path();
            self.modified = None;
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(Some(RuntimeConfigSnapshot::default()));
        }

        let modified = fs::metadata(&current_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        if modified != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KVIEW_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kview.yaml"),
        PathBuf::from("kview.yml"),
        PathBuf::from(".kview.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kview/config.yaml"),
            PathBuf::from(&home).join(".config/kview/config.yml"),
            PathBuf::from(&home).join(".kview.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_REFRESH_MS, RuntimeConfigSnapshot, RuntimeConfigWatcher};
    use crate::model::ResourceKind;
    use std::fs;
    use std::time::{Duration, SystemTime};

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kview.yaml");
        fs::write(
            &path,
            "refreshMs: 100\nlogOpenTimeoutMs: 250\nlogTailLines: 50\naliases:\n  dep: deploy\n  bogus: nothing\n",
        )
        .unwrap();

        let snapshot = RuntimeConfigWatcher::at(&path).load_current().unwrap();
        // clamped to the floor
        assert_eq!(snapshot.refresh, Duration::from_millis(500));
        assert_eq!(snapshot.log_open_timeout, Duration::from_millis(250));
        assert_eq!(snapshot.log_tail_lines, 50);
        assert_eq!(snapshot.resolve_kind("dep"), Some(ResourceKind::Deployments));
        assert_eq!(snapshot.resolve_kind("bogus"), None);
        assert_eq!(snapshot.resolve_kind("svc"), Some(ResourceKind::Services));
    }

    #[test]
    fn empty_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kview.yaml");
        fs::write(&path, "{}\n").unwrap();

        let snapshot = RuntimeConfigWatcher::at(&path).load_current().unwrap();
        assert_eq!(snapshot.refresh, Duration::from_millis(DEFAULT_REFRESH_MS));
        assert_eq!(snapshot.log_tail_lines, 200);
        assert!(snapshot.source.is_some());
        assert_eq!(
            RuntimeConfigSnapshot::default().source,
            None,
            "defaults carry no source"
        );
    }

    #[test]
    fn reload_only_fires_on_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kview.yaml");
        fs::write(&path, "refreshMs: 1000\n").unwrap();

        let mut watcher = RuntimeConfigWatcher::at(&path);
        watcher.load_current().unwrap();
        assert_eq!(watcher.reload_if_changed().unwrap(), None);

        fs::write(&path, "refreshMs: 3000\n").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        let reloaded = watcher.reload_if_changed().unwrap().unwrap();
        assert_eq!(reloaded.refresh, Duration::from_millis(3_000));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kview.yaml");
        fs::write(&path, "refreshMs: [nope\n").unwrap();

        assert!(RuntimeConfigWatcher::at(&path).load_current().is_err());
    }
}
