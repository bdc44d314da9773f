//! Project file persistence.
//!
//! A project is a gzip-compressed JSON document holding the whole
//! [`FullState`]: image paths, one tree per stack, per-stack puncta, opaque
//! collaborator payloads and the project options. Keys are written in sorted
//! order and the gzip header carries no timestamp, so saving the same state
//! twice produces identical bytes.
//!
//! Links are rebuilt and ID counters rescanned on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};

use crate::model::{FullState, Point, ProjectOptions, Tree};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised while reading or writing project and remap files.
#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    /// The document parsed but its content is unusable.
    Format(String),
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Json(e) => write!(f, "invalid project JSON: {}", e),
            Self::Csv(e) => write!(f, "CSV error: {}", e),
            Self::Format(msg) => write!(f, "invalid project: {}", msg),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Format(_) => None,
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ProjectError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<csv::Error> for ProjectError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

// ── On-disk document ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectRecord {
    file_paths: Vec<String>,
    trees: Vec<Tree>,
    puncta: Vec<Vec<Point>>,
    traces: Vec<serde_json::Value>,
    ui_states: Vec<serde_json::Value>,
    project_options: ProjectOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRecordRef<'a> {
    file_paths: &'a [String],
    trees: &'a [Tree],
    puncta: &'a [Vec<Point>],
    traces: &'a [serde_json::Value],
    ui_states: &'a [serde_json::Value],
    project_options: &'a ProjectOptions,
}

impl ProjectRecord {
    fn into_state(self) -> Result<FullState, ProjectError> {
        self.project_options
            .validate()
            .map_err(|e| ProjectError::Format(e.to_string()))?;
        for (s, tree) in self.trees.iter().enumerate() {
            let dups = tree.duplicate_point_ids();
            if !dups.is_empty() {
                return Err(ProjectError::Format(format!(
                    "stack {}: duplicate point IDs {}",
                    s + 1,
                    dups.join(", ")
                )));
            }
        }
        if !self.puncta.is_empty() && self.puncta.len() != self.trees.len() {
            tracing::warn!(
                trees = self.trees.len(),
                puncta = self.puncta.len(),
                "puncta list does not match the number of stacks"
            );
        }
        let mut state = FullState {
            file_paths: self.file_paths,
            trees: self.trees,
            puncta: self.puncta,
            traces: self.traces,
            ui_states: self.ui_states,
            project_options: self.project_options,
            ids: Default::default(),
        };
        state.rescan_ids();
        Ok(state)
    }
}

// ── Load / save ────────────────────────────────────────────────────────────

/// Parse a project from a reader. Both gzip-compressed and plain JSON are
/// accepted.
pub fn read_project<R: Read>(reader: R) -> Result<FullState, ProjectError> {
    let mut bytes = Vec::new();
    BufReader::new(reader).read_to_end(&mut bytes)?;
    let record: ProjectRecord = if bytes.starts_with(&GZIP_MAGIC) {
        let mut json = Vec::new();
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut json)?;
        serde_json::from_slice(&json)?
    } else {
        serde_json::from_slice(&bytes)?
    };
    record.into_state()
}

/// Write `state` as gzip-compressed JSON with sorted keys.
pub fn write_project<W: Write>(state: &FullState, writer: W) -> Result<(), ProjectError> {
    let json = to_sorted_json(state)?;
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(BufWriter::new(writer), Compression::default());
    encoder.write_all(json.as_bytes())?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// The uncompressed project document.
pub fn to_sorted_json(state: &FullState) -> Result<String, ProjectError> {
    let record = ProjectRecordRef {
        file_paths: &state.file_paths,
        trees: &state.trees,
        puncta: &state.puncta,
        traces: &state.traces,
        ui_states: &state.ui_states,
        project_options: &state.project_options,
    };
    // `Value` objects are ordered maps, so the round-trip sorts every key.
    let value = serde_json::to_value(&record)?;
    Ok(serde_json::to_string(&value)?)
}

pub fn load_project(path: &Path) -> Result<FullState, ProjectError> {
    let state = read_project(File::open(path)?)?;
    tracing::info!(
        path = %path.display(),
        stacks = state.n_stacks(),
        points = state.trees.iter().map(Tree::point_count).sum::<usize>(),
        "project loaded"
    );
    Ok(state)
}

pub fn save_project(state: &FullState, path: &Path) -> Result<(), ProjectError> {
    write_project(state, File::create(path)?)?;
    tracing::info!(path = %path.display(), stacks = state.n_stacks(), "project saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IdAllocator;
    use crate::test_utils::TreeBuilder;

    fn sample_state() -> FullState {
        let tree = TreeBuilder::new([0.0; 3])
            .branch("0000000a", "root", &[("0000001f", [1.0, 2.0, 3.0]), ("p2", [2.0, 2.0, 3.0])])
            .branch("orphan", "gone", &[("p9", [9.0, 9.0, 9.0])])
            .build();
        let mut state = FullState::from_trees(vec![tree.clone(), tree], ProjectOptions::default());
        state.file_paths = vec!["t0.tif".into(), "t1.tif".into()];
        state.puncta = vec![vec![Point::new("00000040", [1.0, 1.0, 1.0]).with_radius(2.0)], vec![]];
        state.traces = vec![serde_json::json!({"kind": "trace", "points": [1, 2]})];
        state.ui_states = vec![serde_json::json!({"zoom": 2.5})];
        state
    }

    #[test]
    fn roundtrip_preserves_state_and_rebuilds_ids() {
        let state = sample_state();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.dyn.gz");
        save_project(&state, &path).unwrap();

        let mut loaded = load_project(&path).unwrap();
        assert_eq!(loaded.trees, state.trees);
        assert_eq!(loaded.puncta, state.puncta);
        assert_eq!(loaded.file_paths, state.file_paths);
        assert_eq!(loaded.traces, state.traces);
        assert_eq!(loaded.ui_states, state.ui_states);
        assert_eq!(loaded.project_options, state.project_options);
        assert_eq!(loaded.ids, IdAllocator::scan(&state.trees, &state.puncta));
        assert_eq!(loaded.ids.next_point_id(), "00000041");

        // Disconnected branches survive the round trip.
        assert!(loaded.trees[0].branch("orphan").is_some());
        assert!(loaded.trees[0].connected_branches().len() < loaded.trees[0].branches().len());
    }

    #[test]
    fn output_is_deterministic_with_sorted_keys() {
        let state = sample_state();
        let mut first = Vec::new();
        let mut second = Vec::new();
        write_project(&state, &mut first).unwrap();
        write_project(&state, &mut second).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(&GZIP_MAGIC));

        let json = to_sorted_json(&state).unwrap();
        let keys = ["\"filePaths\"", "\"projectOptions\"", "\"puncta\"", "\"traces\"", "\"trees\"", "\"uiStates\""];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"parentPoint\":\"root\""));
    }

    #[test]
    fn plain_json_and_missing_fields_load() {
        let raw = r#"{"trees":[{"rootPoint":{"id":"s","location":[0,0,0],"annotation":"soma"},
            "branches":[{"id":"b","parentPoint":"s","points":[{"id":"x","location":[3,4,0]}]}]}]}"#;
        let state = read_project(raw.as_bytes()).unwrap();
        assert_eq!(state.n_stacks(), 1);
        assert_eq!(state.project_options, ProjectOptions::default());
        assert_eq!(state.trees[0].children("s").to_vec(), vec!["b".to_string()]);
        assert!(state.puncta.is_empty());
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(read_project(&b"{not json"[..]), Err(ProjectError::Json(_))));
        let bad_opts = r#"{"projectOptions":{"pixelSizes":[0,1,1]}}"#;
        assert!(matches!(read_project(bad_opts.as_bytes()), Err(ProjectError::Format(_))));
        let dup_points = r#"{"trees":[{"rootPoint":{"id":"p","location":[0,0,0]},
            "branches":[{"id":"B","parentPoint":"p","points":[{"id":"p","location":[1,0,0]}]}]}]}"#;
        match read_project(dup_points.as_bytes()) {
            Err(ProjectError::Format(msg)) => assert!(msg.contains("stack 1"), "{msg}"),
            other => panic!("expected a format error, got {other:?}"),
        }
        let missing = Path::new("/definitely/not/here.dyn.gz");
        assert!(matches!(load_project(missing), Err(ProjectError::Io(_))));
    }
}
