use crate::model::Database;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

pub trait Storage: Send + Sync {
    /// Charge la base depuis un support.
    fn load(&self) -> anyhow::Result<Database>;
    /// Sauvegarde de manière atomique.
    fn save(&self, db: &Database) -> anyhow::Result<()>;
}

pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> anyhow::Result<Database> {
        let data =
            fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))?;
        let db: Database = serde_json::from_slice(&data).with_context(|| "parsing database json")?;
        Ok(db)
    }

    fn save(&self, db: &Database) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(db)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).with_context(|| "atomic rename")?;
        Ok(())
    }
}

/// Stockage en mémoire (tests, outils) ; peut être rendu défaillant.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    db: Mutex<Option<Database>>,
    fail_saves: Mutex<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            db: Mutex::new(Some(db)),
            fail_saves: Mutex::new(false),
        }
    }

    /// Les sauvegardes suivantes échouent tant que `failing` est vrai.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.fail_saves.lock() {
            *flag = failing;
        }
    }

    /// Dernière version sauvegardée.
    pub fn snapshot(&self) -> Option<Database> {
        self.db.lock().ok().and_then(|db| db.clone())
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> anyhow::Result<Database> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?
            .clone()
            .context("nothing saved yet")
    }

    fn save(&self, db: &Database) -> anyhow::Result<()> {
        let failing = *self
            .fail_saves
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?;
        if failing {
            anyhow::bail!("storage unavailable");
        }
        *self
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))? = Some(db.clone());
        Ok(())
    }
}
