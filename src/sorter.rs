//! Annotation store for reviewing batches of rendered exposures.
//!
//! Each reviewed image is keyed by the (dayObs, seqNum) pair embedded in its
//! filename. The store persists to JSON after every change so a crash during
//! a long review session never loses completed annotations.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Key identifying one exposure: observation day and sequence number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataId {
    /// Observation day, YYYY-MM-DD.
    pub day_obs: String,
    /// Sequence number within the day.
    pub seq_num: u32,
}

impl DataId {
    /// Parse the data id embedded in a rendered-image filename, which carries
    /// `dayObs-YYYY-MM-DD` and `seqNum-N` markers.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let bad = || Error::BadDataId {
            filename: filename.to_string(),
        };

        let day_start = filename.find("dayObs-").ok_or_else(bad)? + "dayObs-".len();
        let day_obs = filename.get(day_start..day_start + 10).ok_or_else(bad)?;

        let seq_start = filename.find("seqNum-").ok_or_else(bad)? + "seqNum-".len();
        let seq_text = &filename[seq_start..];
        let seq_end = seq_text.find('-').unwrap_or(seq_text.len());
        let seq_num: u32 = seq_text[..seq_end].parse().map_err(|_| bad())?;

        Ok(DataId {
            day_obs: day_obs.to_string(),
            seq_num,
        })
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.day_obs, self.seq_num)
    }
}

/// How a review session treats images that already carry annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    /// Show every image, appending to existing annotations.
    Append,
    /// Show every image, replacing existing annotations.
    Overwrite,
    /// Skip images with any existing entry, blank entries included.
    SkipExisting,
    /// Skip images whose existing entry is not blank.
    SkipNonBlank,
    /// Print the stored annotations and stop.
    DumpAndExit,
}

impl ReviewMode {
    /// Mode from the operator's menu key, case-insensitive.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_uppercase() {
            'A' => Some(ReviewMode::Append),
            'O' => Some(ReviewMode::Overwrite),
            'S' => Some(ReviewMode::SkipExisting),
            'B' => Some(ReviewMode::SkipNonBlank),
            'D' => Some(ReviewMode::DumpAndExit),
            _ => None,
        }
    }

    /// Whether an image with an existing annotation should be skipped.
    pub fn skips(&self, existing: &str) -> bool {
        match self {
            ReviewMode::SkipExisting => true,
            ReviewMode::SkipNonBlank => !existing.is_empty(),
            _ => false,
        }
    }
}

/// On-disk record: one annotated exposure.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    day_obs: String,
    seq_num: u32,
    annotation: String,
}

/// Annotations keyed by data id, persisted to a JSON file on every write.
#[derive(Debug)]
pub struct AnnotationStore {
    path: PathBuf,
    entries: BTreeMap<DataId, String>,
}

impl AnnotationStore {
    /// Open a store, loading existing annotations if the file is present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let stored: Vec<StoredEntry> = serde_json::from_str(&text)?;
            stored
                .into_iter()
                .map(|e| {
                    (
                        DataId {
                            day_obs: e.day_obs,
                            seq_num: e.seq_num,
                        },
                        e.annotation,
                    )
                })
                .collect()
        } else {
            BTreeMap::new()
        };
        Ok(AnnotationStore { path, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &DataId) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DataId, &str)> {
        self.entries.iter().map(|(id, a)| (id, a.as_str()))
    }

    /// Record an annotation and persist immediately.
    ///
    /// Overwrite mode replaces any existing entry; every other mode appends to
    /// it, so repeated review passes accumulate rather than destroy.
    pub fn add(&mut self, id: DataId, annotation: &str, mode: ReviewMode) -> Result<()> {
        if mode == ReviewMode::Overwrite {
            self.entries.insert(id, annotation.to_string());
        } else {
            self.entries.entry(id).or_default().push_str(annotation);
        }
        self.save()
    }

    /// Write the store to disk through a temp file and rename, so a crash
    /// mid-write leaves the previous file intact.
    pub fn save(&self) -> Result<()> {
        let stored: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|(id, annotation)| StoredEntry {
                day_obs: id.day_obs.clone(),
                seq_num: id.seq_num,
                annotation: annotation.clone(),
            })
            .collect();
        let text = serde_json::to_string_pretty(&stored)?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, text)?;
        fs::rename(&tmp_path, &self.path)?;
        log::debug!("saved {} annotations to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    /// Split stored annotations into tags and free-form notes.
    ///
    /// Everything before the first whitespace is the tag string, lower-cased;
    /// everything after it is the note. Entries without whitespace are all tag.
    pub fn tags_and_notes(&self) -> (BTreeMap<DataId, String>, BTreeMap<DataId, String>) {
        let mut tags = BTreeMap::new();
        let mut notes = BTreeMap::new();
        for (id, annotation) in &self.entries {
            match annotation.split_once(char::is_whitespace) {
                Some((tag, note)) => {
                    tags.insert(id.clone(), tag.to_lowercase());
                    if !note.is_empty() {
                        notes.insert(id.clone(), note.to_string());
                    }
                }
                None => {
                    tags.insert(id.clone(), annotation.to_lowercase());
                }
            }
        }
        (tags, notes)
    }
}
