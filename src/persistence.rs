// File: src/persistence.rs
use crate::core::grouper::LengthGroups;
use crate::core::mapping::MappingStore;
use crate::core::scheduler::RoundState;
use crate::core::types::{ConsumedWords, LengthPolicy};
use crate::error::{Result, SolverError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const MAPPING_FILE: &str = "mapping.json";
pub const CONSUMED_FILE: &str = "consumed_words.json";
pub const SESSION_FILE: &str = "session.bin";

/// A scheduler re-armed over the tokens a threshold pass left unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rearm {
    /// Tokens in Length-grouped order.
    pub tokens: Vec<String>,
    pub state: RoundState,
}

impl Rearm {
    pub fn new(groups: &LengthGroups, mapping: &MappingStore) -> Self {
        let policy = groups.policy();
        let pending = groups.retain(|t| !mapping.is_resolved(&policy.cipher_symbols(t)));
        let state = RoundState::new(&pending);
        let tokens = pending
            .iter()
            .flat_map(|(_, tokens)| tokens.iter().cloned())
            .collect();
        Self { tokens, state }
    }

    pub fn groups(&self, policy: LengthPolicy) -> LengthGroups {
        LengthGroups::build(&self.tokens, policy)
    }
}

/// Where a run stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Rounds(RoundState),
    Sweep {
        last_completed: Option<u8>,
        rearm: Option<Rearm>,
    },
    Done,
}

/// Everything needed to pick a run up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub mapping: MappingStore,
    pub consumed: ConsumedWords,
    pub phase: Phase,
}

/// Writes checkpoint artifacts into one directory, each as a whole file.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the mapping, the consumed words and the session.
    ///
    /// Each artifact is replaced atomically; if one fails the others are still
    /// attempted and the first failure is returned.
    pub fn save(&self, session: &Session) -> Result<()> {
        let mapping = serde_json::to_vec_pretty(&flat_mapping(&session.mapping))?;
        let consumed: Vec<&str> = session.consumed.iter().collect();
        let consumed = serde_json::to_vec_pretty(&consumed)?;
        let encoded = bincode::serialize(session)?;

        let results = [
            write_atomic(&self.dir.join(MAPPING_FILE), &mapping),
            write_atomic(&self.dir.join(CONSUMED_FILE), &consumed),
            write_atomic(&self.dir.join(SESSION_FILE), &encoded),
        ];
        let saved: Result<()> = results.into_iter().collect();
        if saved.is_ok() {
            info!(
                "Checkpoint saved to {} ({} pairs, {} consumed)",
                self.dir.display(),
                session.mapping.len(),
                session.consumed.len()
            );
        }
        saved
    }
}

/// The stable on-disk shape: single-symbol keys to lower-case single-symbol values.
pub fn flat_mapping(mapping: &MappingStore) -> BTreeMap<String, String> {
    mapping
        .iter()
        .map(|(origin, target)| (origin.to_string(), target.to_lowercase().to_string()))
        .collect()
}

/// Replaces `path` with `bytes` via a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let failed = |source: std::io::Error| SolverError::CheckpointWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(failed)?;
    temp_file.write_all(bytes).map_err(failed)?;
    temp_file.flush().map_err(failed)?;
    temp_file.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}

/// Rebuilds the mapping and consumed words from the JSON artifacts.
/// A missing consumed-words file is treated as empty.
pub fn load_checkpoint(dir: &Path) -> Result<(MappingStore, ConsumedWords)> {
    let mapping_path = dir.join(MAPPING_FILE);
    if !mapping_path.is_file() {
        return Err(SolverError::MissingInputFile(mapping_path));
    }
    let flat: BTreeMap<String, String> =
        serde_json::from_reader(BufReader::new(File::open(&mapping_path)?))?;

    let mut pairs = Vec::with_capacity(flat.len());
    for (origin, target) in &flat {
        let (Some(o), Some(t)) = (single_char(origin), single_char(target)) else {
            return Err(SolverError::CheckpointCorrupt(format!(
                "{origin:?} -> {target:?} is not a single-symbol pair"
            )));
        };
        pairs.push((o, t));
    }
    let mapping = MappingStore::from_pairs(pairs)
        .map_err(|conflict| SolverError::CheckpointCorrupt(conflict.to_string()))?;

    let consumed_path = dir.join(CONSUMED_FILE);
    let consumed = if consumed_path.is_file() {
        let words: Vec<String> = serde_json::from_reader(BufReader::new(File::open(&consumed_path)?))?;
        words.into_iter().collect()
    } else {
        warn!("{} not found, starting with no consumed words", consumed_path.display());
        ConsumedWords::new()
    };
    Ok((mapping, consumed))
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

pub fn load_session(dir: &Path) -> Result<Session> {
    let path = dir.join(SESSION_FILE);
    if !path.is_file() {
        return Err(SolverError::MissingInputFile(path));
    }
    let reader = BufReader::new(File::open(path)?);
    let session: Session = bincode::deserialize_from(reader)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mapping = MappingStore::from_pairs([('X', 't'), ('Y', 'h'), ('Z', 'e')]).unwrap();
        let consumed = ["the".to_string()].into_iter().collect();
        Session {
            mapping,
            consumed,
            phase: Phase::Sweep {
                last_completed: Some(80),
                rearm: None,
            },
        }
    }

    #[test]
    fn checkpoint_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path()).unwrap();
        checkpointer.save(&session()).unwrap();

        let raw = fs::read_to_string(dir.path().join(MAPPING_FILE)).unwrap();
        let flat: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(flat.get("X").map(String::as_str), Some("t"));

        let (mapping, consumed) = load_checkpoint(dir.path()).unwrap();
        assert_eq!(mapping, session().mapping);
        assert!(consumed.contains("the"));
    }

    #[test]
    fn session_restores_phase() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path().join("nested")).unwrap();
        checkpointer.save(&session()).unwrap();

        let restored = load_session(checkpointer.dir()).unwrap();
        assert_eq!(restored, session());
    }

    #[test]
    fn later_checkpoint_overwrites_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path()).unwrap();
        let mut snapshot = session();
        checkpointer.save(&snapshot).unwrap();

        snapshot.mapping.commit(&['Q'], &['o']).unwrap();
        checkpointer.save(&snapshot).unwrap();
        let (mapping, _) = load_checkpoint(dir.path()).unwrap();
        assert_eq!(mapping.get('Q'), Some('o'));
        assert_eq!(mapping.len(), 4);
    }

    #[test]
    fn corrupt_mappings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MAPPING_FILE), r#"{"AB": "x"}"#).unwrap();
        assert!(matches!(
            load_checkpoint(dir.path()),
            Err(SolverError::CheckpointCorrupt(_))
        ));

        fs::write(dir.path().join(MAPPING_FILE), r#"{"A": "x", "B": "x"}"#).unwrap();
        assert!(matches!(
            load_checkpoint(dir.path()),
            Err(SolverError::CheckpointCorrupt(_))
        ));
    }

    #[test]
    fn missing_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_checkpoint(dir.path()),
            Err(SolverError::MissingInputFile(_))
        ));
        assert!(load_session(dir.path()).is_err());
    }

    #[test]
    fn save_into_removed_directory_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path().join("gone")).unwrap();
        fs::remove_dir_all(checkpointer.dir()).unwrap();

        assert!(matches!(
            checkpointer.save(&session()),
            Err(SolverError::CheckpointWriteFailed { .. })
        ));
        assert!(load_session(checkpointer.dir()).is_err());
    }

    #[test]
    fn write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone").join(MAPPING_FILE);
        assert!(matches!(
            write_atomic(&target, b"{}"),
            Err(SolverError::CheckpointWriteFailed { .. })
        ));
    }
}
