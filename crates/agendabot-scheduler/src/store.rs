//! Dose store: a JSON file of [`DoseSchedule`] records.
//!
//! Every call loads the full file, mutates, and writes it back through a temp
//! file + rename, so a crash mid-write leaves the previous version intact.
//! Single writer only.

use agendabot_core::error::{AgendaError, Result};
use agendabot_core::types::DoseSchedule;
use std::path::{Path, PathBuf};

pub struct DoseStore {
    path: PathBuf,
}

impl DoseStore {
    /// Open (creating an empty record set if needed) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { path };
        if !store.path.exists() {
            store.save(&[])?;
            tracing::info!("💊 Created dose store at {}", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, for read-only callers. Any failure reads as empty.
    pub fn load(&self) -> Vec<DoseSchedule> {
        self.read().unwrap_or_else(|e| {
            tracing::error!("❌ {e}; treating dose store as empty");
            Vec::new()
        })
    }

    /// Malformed JSON is set aside as `.bak` and reads as empty. Any other
    /// read failure is an error, so callers never save over data they could not read.
    fn read(&self) -> Result<Vec<DoseSchedule>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                self.backup();
                return Err(AgendaError::store(format!("cannot read {}: {e}", self.path.display())));
            }
        };
        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::error!("❌ Malformed dose store {}: {e}; treating as empty", self.path.display());
                self.backup();
                Ok(Vec::new())
            }
        }
    }

    fn backup(&self) {
        let backup = self.path.with_extension("json.bak");
        if let Err(e) = std::fs::copy(&self.path, &backup) {
            tracing::warn!("⚠️ Could not back up dose store to {}: {e}", backup.display());
        }
    }

    /// Replace the whole record set atomically.
    pub fn save(&self, records: &[DoseSchedule]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .map_err(|e| AgendaError::store(format!("write {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| AgendaError::store(format!("rename into {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Load, mutate, save. The closure's return value is passed through.
    /// Nothing is written when the file cannot be read.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut Vec<DoseSchedule>) -> T) -> Result<T> {
        let mut records = self.read()?;
        let out = mutate(&mut records);
        self.save(&records)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendabot_core::types::TimeOfDay;

    fn nine() -> TimeOfDay {
        TimeOfDay::new(9, 0).unwrap()
    }

    #[test]
    fn test_open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doses.json");
        let store = DoseStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_update_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doses.json");
        let store = DoseStore::open(&path).unwrap();
        let count = store
            .update(|records| {
                records.push(DoseSchedule::new("Magnesium", nine()));
                records.len()
            })
            .unwrap();
        assert_eq!(count, 1);

        let reopened = DoseStore::open(&path).unwrap();
        let records = reopened.load();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Magnesium");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doses.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = DoseStore::open(&path).unwrap();
        assert!(store.load().is_empty());
        assert!(path.with_extension("json.bak").exists());
    }

    #[test]
    fn test_unreadable_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doses.json");
        let store = DoseStore::open(&path).unwrap();
        store.save(&[DoseSchedule::new("Iron", nine())]).unwrap();

        // Break UTF-8 inside the name.
        let mut bytes = std::fs::read(&path).unwrap();
        let pos = bytes.windows(4).position(|w| w == b"Iron").unwrap();
        bytes[pos] = 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let result = store.update(|records| records.push(DoseSchedule::new("Zinc", nine())));
        assert!(matches!(result, Err(AgendaError::Store(_))));
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(path.with_extension("json.bak").exists());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_on_disk_layout_is_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doses.json");
        let store = DoseStore::open(&path).unwrap();
        store.save(&[DoseSchedule::new("Iron", nine())]).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let first = &raw.as_array().unwrap()[0];
        assert_eq!(first["name"], "Iron");
        assert_eq!(first["time"], "09:00");
        assert_eq!(first["active"], true);
        assert!(first["last_taken_date"].is_null());
        assert!(first["next_reminder"].is_null());
    }
}
