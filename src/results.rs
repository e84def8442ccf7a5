//! Ranked-result files.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::model::Method;
use crate::rank::RankedFact;

/// `<input stem>-ranked-facts-<method>.bin` next to the input.
pub fn default_output_path(input: &Path, method: Method) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}-ranked-facts-{method}.bin"))
}

/// Write the ranked facts as a bincode blob, replacing any existing file.
pub fn write_ranked(path: &Path, facts: &[RankedFact]) -> StoreResult<()> {
    let bytes = bincode::serialize(facts).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    std::fs::write(path, bytes).map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), facts = facts.len(), "ranked facts written");
    Ok(())
}

/// Read a blob written by [`write_ranked`].
pub fn read_ranked(path: &Path) -> StoreResult<Vec<RankedFact>> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    bincode::deserialize(&bytes).map_err(|e| StoreError::Serialization {
        message: format!("{}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;

    #[test]
    fn default_path_replaces_extension() {
        assert_eq!(
            default_output_path(Path::new("data/kg.json"), Method::Patybred),
            PathBuf::from("data/kg-ranked-facts-patybred.bin")
        );
        assert_eq!(
            default_output_path(Path::new("kg"), Method::Sdv),
            PathBuf::from("kg-ranked-facts-sdv.bin")
        );
    }

    #[test]
    fn written_results_read_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("ranked.bin");
        let facts = vec![
            RankedFact {
                rank: 1.0,
                score: 0.1,
                triple: Triple::new(1, 2, 1),
            },
            RankedFact {
                rank: 2.5,
                score: 0.5,
                triple: Triple::new(2, 0, 1),
            },
        ];
        write_ranked(&path, &facts).unwrap();
        assert_eq!(read_ranked(&path).unwrap(), facts);

        write_ranked(&path, &facts[..1]).unwrap();
        assert_eq!(read_ranked(&path).unwrap(), facts[..1].to_vec());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_ranked(&dir.path().join("absent.bin")),
            Err(StoreError::Io { .. })
        ));
    }
}
