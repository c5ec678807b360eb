//! Plugin registry: discovery, lifecycle status and dispatch.
//!
//! The registry owns every registered [`PluginDescriptor`] together with the
//! capability bound for it. A discovery pass scans the plugin directory and
//! converges the registry onto what it finds:
//!
//! - new or changed descriptors are bound and registered as `running`,
//! - unchanged descriptors keep their capability and status,
//! - names no longer found are deregistered (their capability is dropped).
//!
//! A bad candidate is skipped and reported; it never aborts the pass.
//!
//! The map is guarded by a [`std::sync::RwLock`] that is never held across an
//! `.await`. Capabilities are cloned out before they are called.

use crate::capability::{BindContext, BinderSet, PluginCapability};
use crate::descriptor::{DESCRIPTOR_FILE, PluginDescriptor, PluginStatus};
use crate::environment::EnvironmentManager;
use crate::error::{DiscoveryError, DispatchError, RegistryError};
use crate::types::RawResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// A candidate directory that was not registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    /// The candidate's directory.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// A registered plugin whose status could not be written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistFailure {
    /// Plugin name.
    pub name: String,
    /// The write error.
    pub reason: String,
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Names newly registered or re-bound because their descriptor changed.
    pub loaded: Vec<String>,
    /// Names whose descriptor was unchanged and kept as-is.
    pub unchanged: Vec<String>,
    /// Names deregistered because their directory disappeared.
    pub removed: Vec<String>,
    /// Candidates that could not be registered.
    pub skipped: Vec<SkippedCandidate>,
    /// Registered plugins whose `running` status could not be persisted.
    pub persist_failures: Vec<PersistFailure>,
}

impl DiscoveryReport {
    /// Number of plugins registered after the pass.
    pub fn registered(&self) -> usize {
        self.loaded.len() + self.unchanged.len()
    }
}

#[derive(Clone)]
struct Entry {
    descriptor: PluginDescriptor,
    dir: PathBuf,
    capability: Arc<dyn PluginCapability>,
}

/// Holds discovered plugins and routes calls to their capabilities.
pub struct PluginRegistry {
    plugin_dir: PathBuf,
    binders: BinderSet,
    environment: Arc<dyn EnvironmentManager>,
    /// `None` until the first discovery pass completes.
    entries: RwLock<Option<BTreeMap<String, Entry>>>,
    /// Serialises discovery passes.
    pass: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugin_dir", &self.plugin_dir)
            .field("binders", &self.binders)
            .finish_non_exhaustive()
    }
}

impl PluginRegistry {
    /// Creates an empty, undiscovered registry over `plugin_dir`.
    pub fn new(
        plugin_dir: impl Into<PathBuf>,
        binders: BinderSet,
        environment: Arc<dyn EnvironmentManager>,
    ) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            binders,
            environment,
            entries: RwLock::new(None),
            pass: tokio::sync::Mutex::new(()),
        }
    }

    /// The scanned directory.
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Returns `true` once a discovery pass has completed.
    pub fn is_discovered(&self) -> bool {
        self.read().is_some()
    }

    /// Scans the plugin directory and converges the registry onto it.
    ///
    /// # Errors
    ///
    /// Only [`RegistryError::ScanFailed`], when the directory itself cannot be
    /// created or listed. Per-candidate failures land in the report.
    pub async fn discover(&self) -> Result<DiscoveryReport, RegistryError> {
        let _pass = self.pass.lock().await;

        let candidates = self.scan_candidates().await?;
        let previous = self.read().clone().unwrap_or_default();

        let mut report = DiscoveryReport::default();
        let mut next: BTreeMap<String, Entry> = BTreeMap::new();

        for dir in candidates {
            match self.load_candidate(&dir, &previous, &next).await {
                Ok(Candidate::Unchanged(entry)) => {
                    report.unchanged.push(entry.descriptor.name.clone());
                    next.insert(entry.descriptor.name.clone(), entry);
                }
                Ok(Candidate::Loaded { entry, persist }) => {
                    let name = entry.descriptor.name.clone();
                    if let Err(e) = persist {
                        tracing::warn!(
                            plugin = %name,
                            error = %e,
                            "failed to persist plugin status"
                        );
                        report.persist_failures.push(PersistFailure {
                            name: name.clone(),
                            reason: e.to_string(),
                        });
                    }
                    tracing::info!(
                        plugin = %name,
                        protocol = %entry.descriptor.communication.protocol,
                        "plugin registered"
                    );
                    report.loaded.push(name.clone());
                    next.insert(name, entry);
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "skipping plugin candidate");
                    report.skipped.push(SkippedCandidate {
                        path: dir,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.removed = previous
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
        for name in &report.removed {
            tracing::info!(plugin = %name, "plugin deregistered");
        }

        // Swap first, then drop the old map outside the lock.
        let old = self.write().replace(next);
        drop(old);
        drop(previous);

        tracing::info!(
            loaded = report.loaded.len(),
            unchanged = report.unchanged.len(),
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            "plugin discovery complete"
        );
        Ok(report)
    }

    /// Snapshot of every registered descriptor, sorted by name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotDiscovered`] before the first discovery pass.
    pub fn get_active(&self) -> Result<Vec<PluginDescriptor>, RegistryError> {
        let guard = self.read();
        let entries = guard.as_ref().ok_or(RegistryError::NotDiscovered)?;
        Ok(entries.values().map(|e| e.descriptor.clone()).collect())
    }

    /// Descriptor registered under `name`.
    pub fn descriptor(&self, name: &str) -> Result<PluginDescriptor, RegistryError> {
        self.with_entry(name, |e| e.descriptor.clone())
    }

    /// Checks the plugin's health and marks it `running` if healthy, `error` otherwise.
    ///
    /// The new status is persisted to the plugin's descriptor file.
    pub async fn start(&self, name: &str) -> Result<PluginStatus, RegistryError> {
        let capability = self.with_entry(name, |e| Arc::clone(&e.capability))?;

        let healthy = match capability.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(plugin = %name, error = %e, "health check failed");
                false
            }
        };
        let status = if healthy {
            PluginStatus::Running
        } else {
            PluginStatus::Error
        };
        self.set_status(name, status)?;
        Ok(status)
    }

    /// Marks the plugin `stopped` and persists it.
    pub fn stop(&self, name: &str) -> Result<PluginStatus, RegistryError> {
        self.set_status(name, PluginStatus::Stopped)?;
        Ok(PluginStatus::Stopped)
    }

    /// Runs the plugin's search and returns its valid results.
    ///
    /// Results with an empty platform or content are dropped with a warning.
    /// Dispatch never changes the plugin's status.
    pub async fn dispatch(
        &self,
        name: &str,
        keyword: &str,
    ) -> Result<Vec<RawResult>, DispatchError> {
        let capability = self
            .with_entry(name, |e| Arc::clone(&e.capability))
            .map_err(|_| DispatchError::NotFound {
                plugin: name.to_owned(),
            })?;

        let raws = capability
            .search(keyword)
            .await
            .map_err(|source| DispatchError::Capability {
                plugin: name.to_owned(),
                source,
            })?;

        let total = raws.len();
        let valid: Vec<RawResult> = raws
            .into_iter()
            .filter(|raw| match raw.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "dropping invalid result");
                    false
                }
            })
            .collect();
        tracing::debug!(plugin = %name, total, valid = valid.len(), "dispatch complete");
        Ok(valid)
    }

    // ── private helpers ───────────────────────────────────────────────────────

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<BTreeMap<String, Entry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<BTreeMap<String, Entry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_entry<T>(&self, name: &str, f: impl FnOnce(&Entry) -> T) -> Result<T, RegistryError> {
        let guard = self.read();
        let entries = guard.as_ref().ok_or(RegistryError::NotDiscovered)?;
        entries
            .get(name)
            .map(f)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Writes the new status to disk, then commits it in memory. A failed
    /// write leaves the registered status untouched.
    fn set_status(&self, name: &str, status: PluginStatus) -> Result<(), RegistryError> {
        let (mut descriptor, dir) =
            self.with_entry(name, |e| (e.descriptor.clone(), e.dir.clone()))?;
        descriptor.status = status;
        descriptor.save(&dir)?;

        {
            let mut guard = self.write();
            let entry = guard
                .as_mut()
                .ok_or(RegistryError::NotDiscovered)?
                .get_mut(name)
                .ok_or_else(|| RegistryError::NotFound {
                    name: name.to_owned(),
                })?;
            entry.descriptor.status = status;
        }
        tracing::info!(plugin = %name, %status, "plugin status changed");
        Ok(())
    }

    /// Sub-directories of the plugin directory that hold a descriptor,
    /// sorted by path. Names starting with `_` or `.` are ignored.
    async fn scan_candidates(&self) -> Result<Vec<PathBuf>, RegistryError> {
        let scan_err = |source| RegistryError::ScanFailed {
            path: self.plugin_dir.clone(),
            source,
        };

        if !tokio::fs::try_exists(&self.plugin_dir)
            .await
            .map_err(scan_err)?
        {
            tracing::info!(path = %self.plugin_dir.display(), "creating plugin directory");
            tokio::fs::create_dir_all(&self.plugin_dir)
                .await
                .map_err(scan_err)?;
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.plugin_dir)
            .await
            .map_err(scan_err)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(scan_err)? {
            let file_name = entry.file_name();
            let hidden = file_name
                .to_str()
                .is_none_or(|n| n.starts_with('_') || n.starts_with('.'));
            if hidden {
                continue;
            }
            let path = entry.path();
            if path.is_dir() && path.join(DESCRIPTOR_FILE).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    async fn load_candidate(
        &self,
        dir: &Path,
        previous: &BTreeMap<String, Entry>,
        next: &BTreeMap<String, Entry>,
    ) -> Result<Candidate, DiscoveryError> {
        let path = PluginDescriptor::path_in(dir);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DiscoveryError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let mut descriptor = PluginDescriptor::from_toml_str(&content, &path).map_err(|e| {
            DiscoveryError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        let name = descriptor.name.clone();

        if next.contains_key(&name) {
            return Err(DiscoveryError::DuplicateName { name });
        }

        if let Some(existing) = previous.get(&name) {
            if existing.dir == dir && existing.descriptor.same_definition(&descriptor) {
                return Ok(Candidate::Unchanged(existing.clone()));
            }
        }

        let environment = self
            .environment
            .ensure_environment(&descriptor)
            .map_err(|source| DiscoveryError::Environment {
                name: name.clone(),
                source,
            })?;

        let protocol = descriptor.communication.protocol.clone();
        let binder = self
            .binders
            .get(&protocol)
            .ok_or_else(|| DiscoveryError::MissingBinding {
                name: name.clone(),
                protocol,
            })?;
        let capability = binder
            .bind(&BindContext {
                descriptor: &descriptor,
                plugin_dir: dir,
                environment: &environment,
            })
            .map_err(|e| DiscoveryError::Binding {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let persist = if descriptor.status == PluginStatus::Running {
            Ok(())
        } else {
            descriptor.status = PluginStatus::Running;
            descriptor.save(dir)
        };

        Ok(Candidate::Loaded {
            entry: Entry {
                descriptor,
                dir: dir.to_path_buf(),
                capability,
            },
            persist,
        })
    }
}

enum Candidate {
    Unchanged(Entry),
    Loaded {
        entry: Entry,
        persist: Result<(), crate::error::ConfigError>,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::capability::CapabilityBinder;
    use crate::environment::HostEnvironment;
    use crate::error::CapabilityError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCapability {
        results: Vec<RawResult>,
        healthy: bool,
    }

    #[async_trait]
    impl PluginCapability for FixedCapability {
        async fn search(&self, _keyword: &str) -> Result<Vec<RawResult>, CapabilityError> {
            Ok(self.results.clone())
        }

        async fn health_check(&self) -> Result<bool, CapabilityError> {
            Ok(self.healthy)
        }
    }

    /// Binds every descriptor to a [`FixedCapability`]; `settings.healthy`
    /// controls the health check.
    #[derive(Default)]
    struct MockBinder {
        binds: Arc<AtomicUsize>,
    }

    impl CapabilityBinder for MockBinder {
        fn protocol(&self) -> &str {
            "mock"
        }

        fn bind(
            &self,
            ctx: &BindContext<'_>,
        ) -> Result<Arc<dyn PluginCapability>, CapabilityError> {
            self.binds.fetch_add(1, Ordering::SeqCst);
            let healthy = ctx
                .descriptor
                .settings
                .get("healthy")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            let name = ctx.descriptor.name.clone();
            Ok(Arc::new(FixedCapability {
                results: vec![
                    RawResult::new(name.clone(), "rust news"),
                    RawResult::new("", "no platform"),
                    RawResult::new(name, "   "),
                ],
                healthy,
            }))
        }
    }

    fn write_plugin(root: &Path, dir: &str, body: &str) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).expect("mkdir");
        std::fs::write(path.join(DESCRIPTOR_FILE), body).expect("write descriptor");
    }

    fn mock_descriptor(name: &str, extra: &str) -> String {
        format!(
            "name = \"{name}\"\nversion = \"1.0\"\n[communication]\nprotocol = \"mock\"\n{extra}"
        )
    }

    fn registry(root: &Path) -> (PluginRegistry, Arc<AtomicUsize>) {
        let binder = MockBinder::default();
        let binds = Arc::clone(&binder.binds);
        let mut binders = BinderSet::new();
        binders.register(binder);
        (
            PluginRegistry::new(root, binders, Arc::new(HostEnvironment::new())),
            binds,
        )
    }

    #[test]
    fn get_active_before_discovery_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (reg, _) = registry(dir.path());
        assert!(matches!(reg.get_active(), Err(RegistryError::NotDiscovered)));
        assert!(!reg.is_discovered());
    }

    #[tokio::test]
    async fn missing_plugin_dir_is_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("plugins");
        let (reg, _) = registry(&root);
        let report = reg.discover().await.expect("discover");
        assert_eq!(report.registered(), 0);
        assert!(root.is_dir());
        assert!(reg.get_active().expect("active").is_empty());
    }

    #[tokio::test]
    async fn discovered_plugins_are_running_and_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "b", &mock_descriptor("beta", ""));
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, _) = registry(dir.path());

        let report = reg.discover().await.expect("discover");
        assert_eq!(report.loaded, vec!["alpha", "beta"]);

        let active = reg.get_active().expect("active");
        let names: Vec<_> = active.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(active.iter().all(|d| d.status == PluginStatus::Running));

        let on_disk = PluginDescriptor::load(&dir.path().join("a")).expect("load");
        assert_eq!(on_disk.status, PluginStatus::Running);
    }

    #[tokio::test]
    async fn hidden_and_underscore_dirs_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "_template", &mock_descriptor("template", ""));
        write_plugin(dir.path(), ".cache", &mock_descriptor("cache", ""));
        write_plugin(dir.path(), "real", &mock_descriptor("real", ""));
        let (reg, _) = registry(dir.path());

        let report = reg.discover().await.expect("discover");
        assert_eq!(report.loaded, vec!["real"]);
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn repeated_discovery_keeps_capability_and_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, binds) = registry(dir.path());

        reg.discover().await.expect("first");
        reg.stop("alpha").expect("stop");
        let report = reg.discover().await.expect("second");

        assert_eq!(report.unchanged, vec!["alpha"]);
        assert!(report.loaded.is_empty());
        assert_eq!(binds.load(Ordering::SeqCst), 1);
        assert_eq!(
            reg.descriptor("alpha").expect("descriptor").status,
            PluginStatus::Stopped
        );
    }

    #[tokio::test]
    async fn changed_descriptor_is_rebound() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, binds) = registry(dir.path());
        reg.discover().await.expect("first");

        write_plugin(
            dir.path(),
            "a",
            &mock_descriptor("alpha", "[settings]\nhealthy = false\n"),
        );
        let report = reg.discover().await.expect("second");
        assert_eq!(report.loaded, vec!["alpha"]);
        assert_eq!(binds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn removed_directory_is_deregistered() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        write_plugin(dir.path(), "b", &mock_descriptor("beta", ""));
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("first");

        std::fs::remove_dir_all(dir.path().join("b")).expect("remove");
        let report = reg.discover().await.expect("second");
        assert_eq!(report.removed, vec!["beta"]);
        assert!(matches!(
            reg.descriptor("beta"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn bad_candidates_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        write_plugin(dir.path(), "b", &mock_descriptor("alpha", ""));
        write_plugin(dir.path(), "c", "not = [valid");
        write_plugin(
            dir.path(),
            "d",
            "name = \"delta\"\nversion = \"1\"\n[communication]\nprotocol = \"carrier-pigeon\"\n",
        );
        write_plugin(
            dir.path(),
            "e",
            &mock_descriptor("echo", "[environment]\nruntime = \"no-such-runtime-xyz\"\n"),
        );
        let (reg, _) = registry(dir.path());

        let report = reg.discover().await.expect("discover");
        assert_eq!(report.loaded, vec!["alpha"]);
        assert_eq!(report.skipped.len(), 4);
        let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert!(reasons[0].contains("duplicate plugin name alpha"));
        assert!(reasons[1].contains("malformed descriptor"));
        assert!(reasons[2].contains("carrier-pigeon"));
        assert!(reasons[3].contains("environment"));
    }

    #[tokio::test]
    async fn start_healthy_marks_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");
        reg.stop("alpha").expect("stop");

        let status = reg.start("alpha").await.expect("start");
        assert_eq!(status, PluginStatus::Running);
        let on_disk = PluginDescriptor::load(&dir.path().join("a")).expect("load");
        assert_eq!(on_disk.status, PluginStatus::Running);
    }

    #[tokio::test]
    async fn start_unhealthy_marks_error_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(
            dir.path(),
            "a",
            &mock_descriptor("alpha", "[settings]\nhealthy = false\n"),
        );
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");

        let status = reg.start("alpha").await.expect("start");
        assert_eq!(status, PluginStatus::Error);
        let on_disk = PluginDescriptor::load(&dir.path().join("a")).expect("load");
        assert_eq!(on_disk.status, PluginStatus::Error);
    }

    #[tokio::test]
    async fn failed_stop_write_keeps_registered_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");
        std::fs::remove_dir_all(dir.path().join("a")).expect("rm");

        let err = reg.stop("alpha").unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)), "{err}");
        assert_eq!(
            reg.descriptor("alpha").expect("descriptor").status,
            PluginStatus::Running
        );
    }

    #[tokio::test]
    async fn failed_start_write_keeps_registered_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(
            dir.path(),
            "a",
            &mock_descriptor("alpha", "[settings]\nhealthy = false\n"),
        );
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");
        std::fs::remove_dir_all(dir.path().join("a")).expect("rm");

        assert!(reg.start("alpha").await.is_err());
        assert_eq!(
            reg.descriptor("alpha").expect("descriptor").status,
            PluginStatus::Running
        );
    }

    #[tokio::test]
    async fn stop_unknown_plugin_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");
        assert!(matches!(
            reg.stop("ghost"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn dispatch_drops_invalid_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");

        let results = reg.dispatch("alpha", "rust").await.expect("dispatch");
        assert_eq!(results, vec![RawResult::new("alpha", "rust news")]);
    }

    #[tokio::test]
    async fn dispatch_unknown_plugin_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");
        let err = reg.dispatch("ghost", "rust").await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn dispatch_does_not_change_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_plugin(dir.path(), "a", &mock_descriptor("alpha", ""));
        let (reg, _) = registry(dir.path());
        reg.discover().await.expect("discover");
        reg.stop("alpha").expect("stop");

        reg.dispatch("alpha", "rust").await.expect("dispatch");
        assert_eq!(
            reg.descriptor("alpha").expect("descriptor").status,
            PluginStatus::Stopped
        );
    }
}
