//! On-disk layout of the embedded store: one pretty-printed JSON file per
//! collection under the data directory.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::storage::EntityKind;

use super::collection::Collection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFile {
    pub saved_at: DateTime<Utc>,
    pub documents: Vec<Value>,
}

pub(crate) struct CollectionFiles {
    data_dir: PathBuf,
}

impl CollectionFiles {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn path(&self, kind: EntityKind) -> PathBuf {
        self.data_dir.join(format!("{}.json", kind.collection()))
    }

    /// Load one collection, building its indexes. Missing file means empty.
    pub fn load(&self, kind: EntityKind) -> Result<Collection> {
        let mut collection = Collection::new(kind);
        let path = self.path(kind);
        if !path.exists() {
            return Ok(collection);
        }

        let contents = std::fs::read_to_string(&path)?;
        let file: CollectionFile = serde_json::from_str(&contents)?;
        for doc in file.documents {
            match doc.get("id").and_then(Value::as_str) {
                Some(id) => {
                    let id = id.to_string();
                    collection.insert(id, doc);
                }
                None => debug!(collection = kind.collection(), "Skipping document without id"),
            }
        }
        debug!(
            collection = kind.collection(),
            count = collection.len(),
            saved_at = %file.saved_at,
            "Loaded collection"
        );
        Ok(collection)
    }

    /// Write a collection to a sibling temp file, then rename it into place so
    /// a crash never leaves a half-written file.
    pub fn save(&self, kind: EntityKind, collection: &Collection) -> Result<()> {
        let file = CollectionFile {
            saved_at: Utc::now(),
            documents: collection.documents().cloned().collect(),
        };
        let path = self.path(kind);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(&file)?;
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        debug!(collection = kind.collection(), count = collection.len(), "Saved collection");
        Ok(())
    }
}
