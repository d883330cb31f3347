use crate::error::{Error, Result};
use crate::server::ProcessRecord;
use crate::store::lock::{LockMode, RegistryLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Registry file name under the home directory
pub const REGISTRY_FILE: &str = "instances.json";

/// Lock file name under the home directory
pub const LOCK_FILE: &str = "instances.lock";

/// Current on-disk format version
const FORMAT_VERSION: u32 = 1;

/// On-disk form of the registry.
#[derive(Deserialize)]
struct RegistryDocument {
    version: u32,
    processes: BTreeMap<String, ProcessRecord>,
}

#[derive(Serialize)]
struct RegistryDocumentRef<'a> {
    version: u32,
    processes: &'a BTreeMap<String, ProcessRecord>,
}

/// Durable mapping from identity to [`ProcessRecord`].
///
/// The whole mapping lives in one JSON file that is read in full and
/// rewritten in full on every change. Rewrites go to a temporary file in the
/// same directory which is then renamed over the registry, so readers only
/// ever see a complete document. Every read-modify-write holds an exclusive
/// advisory lock, making `save` and `remove` atomic across concurrent
/// invocations sharing one home directory.
///
/// All operations block while another invocation holds the lock; async
/// callers run them on the blocking pool.
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    home: PathBuf,
    path: PathBuf,
    lock_path: PathBuf,
}

impl ProcessRegistry {
    /// Open the registry under `home`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreInit`] if the directory cannot be created.
    pub fn open(home: impl Into<PathBuf>) -> Result<Self> {
        let home = home.into();
        fs::create_dir_all(&home).map_err(|e| Error::StoreInit {
            path: home.clone(),
            source: e,
        })?;

        Ok(Self {
            path: home.join(REGISTRY_FILE),
            lock_path: home.join(LOCK_FILE),
            home,
        })
    }

    /// Home directory the registry lives in
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Path of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every registered record.
    ///
    /// An absent or empty file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreCorrupt`] if the file has content that isn't a
    /// valid registry document. Nothing is returned in that case, not even the
    /// records that could be decoded.
    pub fn find_all(&self) -> Result<BTreeMap<String, ProcessRecord>> {
        let _lock = RegistryLock::acquire(&self.lock_path, LockMode::Shared)?;
        self.read()
    }

    /// Look up one record; `None` when not registered
    pub fn find(&self, identity: &str) -> Result<Option<ProcessRecord>> {
        Ok(self.find_all()?.remove(identity))
    }

    /// Whether `identity` is registered
    pub fn exists(&self, identity: &str) -> Result<bool> {
        Ok(self.find_all()?.contains_key(identity))
    }

    /// Insert or replace the record under its identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreWrite`] if the registry cannot be persisted; the
    /// previous file is left as it was.
    pub fn save(&self, record: &ProcessRecord) -> Result<()> {
        let _lock = self.lock_exclusive()?;
        let mut processes = self.read()?;
        processes.insert(record.identity().to_string(), record.clone());
        self.write(&processes)?;
        tracing::debug!(identity = %record.identity(), pid = record.pid(), "Saved process record");
        Ok(())
    }

    /// Remove a record and return it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `identity` is not registered; the file is
    /// not rewritten in that case.
    pub fn remove(&self, identity: &str) -> Result<ProcessRecord> {
        let _lock = self.lock_exclusive()?;
        let mut processes = self.read()?;
        let record = processes
            .remove(identity)
            .ok_or_else(|| Error::NotFound(identity.to_string()))?;
        self.write(&processes)?;
        tracing::debug!(identity, "Removed process record");
        Ok(record)
    }

    /// Drop every record for which `keep` returns false, in one locked rewrite.
    ///
    /// Returns the removed records. The file is only rewritten if something
    /// was removed.
    pub fn retain(&self, mut keep: impl FnMut(&ProcessRecord) -> bool) -> Result<Vec<ProcessRecord>> {
        let _lock = self.lock_exclusive()?;
        let mut processes = self.read()?;

        let removed_ids: Vec<String> = processes
            .values()
            .filter(|record| !keep(record))
            .map(|record| record.identity().to_string())
            .collect();
        if removed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let removed = removed_ids
            .iter()
            .filter_map(|id| processes.remove(id))
            .collect();
        self.write(&processes)?;
        Ok(removed)
    }

    fn lock_exclusive(&self) -> Result<RegistryLock> {
        RegistryLock::acquire(&self.lock_path, LockMode::Exclusive).map_err(|e| Error::StoreWrite {
            path: self.lock_path.clone(),
            source: e,
        })
    }

    /// Read and decode the registry; the caller holds the lock.
    fn read(&self) -> Result<BTreeMap<String, ProcessRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        let document: RegistryDocument =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e.to_string()))?;
        if document.version != FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format version {}",
                document.version
            )));
        }
        if let Some((key, record)) = document
            .processes
            .iter()
            .find(|(key, record)| key.as_str() != record.identity())
        {
            return Err(self.corrupt(format!(
                "entry '{}' holds a record for '{}'",
                key,
                record.identity()
            )));
        }

        Ok(document.processes)
    }

    /// Atomically replace the registry file; the caller holds the exclusive lock.
    fn write(&self, processes: &BTreeMap<String, ProcessRecord>) -> Result<()> {
        write_document(&self.home, &self.path, processes).map_err(|source| {
            tracing::error!(path = %self.path.display(), error = %source, "Failed to persist process registry");
            Error::StoreWrite {
                path: self.path.clone(),
                source,
            }
        })
    }

    fn corrupt(&self, reason: String) -> Error {
        tracing::error!(path = %self.path.display(), %reason, "Process registry is corrupt");
        Error::StoreCorrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

/// Write `processes` to a temporary file in `dir` and rename it over `path`.
///
/// On failure the temporary file is removed and `path` is untouched.
fn write_document(
    dir: &Path,
    path: &Path,
    processes: &BTreeMap<String, ProcessRecord>,
) -> io::Result<()> {
    let document = RegistryDocumentRef {
        version: FORMAT_VERSION,
        processes,
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, &document).map_err(io::Error::from)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Make the rename itself durable; not all platforms allow syncing a directory
    if let Ok(dir) = fs::File::open(dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(identity: &str, pid: u32, home: &Path) -> ProcessRecord {
        let workspace = home.join(identity);
        ProcessRecord::new(
            identity,
            pid,
            &workspace,
            workspace.join("logging.properties"),
            workspace.join("logs/member.log"),
        )
    }

    #[test]
    fn test_open_creates_home() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("nested/home");
        let registry = ProcessRegistry::open(&home).unwrap();
        assert!(home.is_dir());
        assert_eq!(registry.path(), home.join(REGISTRY_FILE));
        // Lazily created: nothing written until the first save
        assert!(!registry.path().exists());
        assert!(registry.find_all().unwrap().is_empty());
    }

    #[test]
    fn test_open_fails_when_home_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = ProcessRegistry::open(blocker.join("home")).unwrap_err();
        match err {
            Error::StoreInit { path, .. } => assert_eq!(path, blocker.join("home")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();

        registry.save(&record("eager_hopper", 1, dir.path())).unwrap();
        registry.save(&record("eager_hopper", 2, dir.path())).unwrap();

        let all = registry.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["eager_hopper"].pid(), 2);
    }

    #[test]
    fn test_empty_file_is_empty_registry() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        fs::write(registry.path(), b"").unwrap();
        assert!(registry.find_all().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        fs::write(registry.path(), br#"{"version": 99, "processes": {}}"#).unwrap();
        assert!(matches!(
            registry.find_all().unwrap_err(),
            Error::StoreCorrupt { .. }
        ));
    }

    #[test]
    fn test_mismatched_key_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        registry.save(&record("eager_hopper", 1, dir.path())).unwrap();

        let content = fs::read_to_string(registry.path()).unwrap();
        fs::write(
            registry.path(),
            content.replacen("\"eager_hopper\": {", "\"keen_turing\": {", 1),
        )
        .unwrap();

        assert!(matches!(
            registry.find_all().unwrap_err(),
            Error::StoreCorrupt { .. }
        ));
    }

    #[test]
    fn test_retain_only_rewrites_on_change() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        registry.save(&record("eager_hopper", 1, dir.path())).unwrap();
        registry.save(&record("keen_turing", 2, dir.path())).unwrap();

        let before = fs::read(registry.path()).unwrap();
        assert!(registry.retain(|_| true).unwrap().is_empty());
        assert_eq!(fs::read(registry.path()).unwrap(), before);

        let removed = registry.retain(|r| r.pid() != 1).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].identity(), "eager_hopper");
        assert!(!registry.exists("eager_hopper").unwrap());
        assert!(registry.exists("keen_turing").unwrap());
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_failed_rename_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        registry.save(&record("eager_hopper", 1, dir.path())).unwrap();
        let before = fs::read(registry.path()).unwrap();

        // A non-empty directory cannot be replaced by a rename
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("occupant"), b"").unwrap();

        let mut processes = registry.find_all().unwrap();
        processes.insert(
            "keen_turing".to_string(),
            record("keen_turing", 2, dir.path()),
        );
        assert!(write_document(dir.path(), &blocked, &processes).is_err());

        assert_eq!(fs::read(registry.path()).unwrap(), before);
        assert_eq!(
            dir_entries(dir.path()),
            vec!["blocked", REGISTRY_FILE, LOCK_FILE]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_save_into_read_only_home_is_store_write() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not apply to root
        if nix::unistd::geteuid().is_root() {
            return;
        }

        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        registry.save(&record("eager_hopper", 1, dir.path())).unwrap();
        let before = fs::read(registry.path()).unwrap();

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        let result = registry.save(&record("keen_turing", 2, dir.path()));
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();

        match result.unwrap_err() {
            Error::StoreWrite { path, .. } => assert_eq!(path, registry.path()),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(registry.path()).unwrap(), before);
        assert_eq!(dir_entries(dir.path()), vec![REGISTRY_FILE, LOCK_FILE]);
        assert!(!registry.exists("keen_turing").unwrap());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let registry = ProcessRegistry::open(dir.path()).unwrap();
        for pid in 0..5 {
            registry.save(&record(&format!("member_{pid}"), pid, dir.path())).unwrap();
        }

        assert_eq!(dir_entries(dir.path()), vec![REGISTRY_FILE, LOCK_FILE]);
    }
}
