//! YAML persistence for [`CodeStore`].
//!
//! The store file lists families, formats and segments in dependency order, so a reader can
//! rebuild the store in a single pass:
//!
//! ```yaml
//! version: 1
//! families: [...]   # creation order
//! formats: [...]    # grouped by family, family order
//! segments: [...]   # parents before children
//! ```
//!
//! Loading does not trust stored paths or levels: every format is recompiled and every segment
//! re-validated, so a hand-edited file with an invalid hierarchy is rejected.

use crate::constants::STORE_FORMAT_VERSION;
use crate::error::{CodeError, CodeResult};
use crate::model::{FormatDefinition, FormatFamily, SegmentInstance};
use crate::store::CodeStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreFile {
    pub version: u32,
    #[serde(default)]
    pub families: Vec<FormatFamily>,
    #[serde(default)]
    pub formats: Vec<FormatDefinition>,
    #[serde(default)]
    pub segments: Vec<SegmentInstance>,
}

impl CodeStore {
    pub fn to_snapshot(&self) -> StoreFile {
        let families: Vec<FormatFamily> = self.families().cloned().collect();
        let formats = families
            .iter()
            .flat_map(|f| self.formats(f.id))
            .cloned()
            .collect();

        let mut segments = Vec::new();
        for family in &families {
            for root in self.roots(family.id) {
                segments.extend(
                    self.pre_order(root.id)
                        .into_iter()
                        .filter_map(|id| self.segment(id).ok())
                        .cloned(),
                );
            }
        }

        StoreFile {
            version: STORE_FORMAT_VERSION,
            families,
            formats,
            segments,
        }
    }

    /// Rebuilds a store from a snapshot, re-validating every record.
    ///
    /// # Errors
    ///
    /// [`CodeError::InvalidInput`] for an unsupported version or duplicate ids, and any
    /// validation error raised by a stored format or segment.
    pub fn from_snapshot(file: StoreFile) -> CodeResult<Self> {
        if file.version != STORE_FORMAT_VERSION {
            return Err(CodeError::InvalidInput(format!(
                "unsupported store version {}, expected {STORE_FORMAT_VERSION}",
                file.version
            )));
        }

        let mut store = CodeStore::new();
        for family in file.families {
            store.restore_family(family)?;
        }
        for format in file.formats {
            store.restore_format(format)?;
        }
        for segment in file.segments {
            store.restore_segment(segment)?;
        }
        Ok(store)
    }

    /// Writes the store to `path` as YAML.
    ///
    /// The document goes to a sibling temporary file first and is then renamed over `path`, so
    /// an interrupted write never leaves a truncated store behind.
    pub fn save(&self, path: &Path) -> CodeResult<()> {
        let yaml =
            serde_yaml::to_string(&self.to_snapshot()).map_err(CodeError::YamlSerialization)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(CodeError::FileWrite)?;
        }
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(CodeError::FileWrite)?;
        fs::rename(&tmp, path).map_err(CodeError::FileWrite)?;

        tracing::debug!(path = %path.display(), "saved code store");
        Ok(())
    }

    pub fn load(path: &Path) -> CodeResult<Self> {
        let contents = fs::read_to_string(path).map_err(CodeError::FileRead)?;
        let file: StoreFile =
            serde_yaml::from_str(&contents).map_err(CodeError::YamlDeserialization)?;
        let store = Self::from_snapshot(file)?;
        tracing::debug!(path = %path.display(), families = store.families().count(), "loaded code store");
        Ok(store)
    }

    /// Loads `path`, or returns an empty store if the file does not exist yet.
    pub fn load_or_default(path: &Path) -> CodeResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}
