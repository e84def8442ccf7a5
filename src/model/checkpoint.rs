//! Checkpoint files: a bincode envelope around a model's own snapshot.
//!
//! The envelope records which method wrote the payload so a checkpoint is
//! never restored into a different family.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::{ModelError, ModelResult};

use super::Method;

/// Bumped whenever a payload layout changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format: u32,
    method: Method,
    payload: Vec<u8>,
}

/// Encode a model state for [`super::ScoringModel::snapshot`].
pub fn encode<T: Serialize>(method: Method, state: &T) -> ModelResult<Vec<u8>> {
    bincode::serialize(state).map_err(|e| ModelError::TrainingFailure {
        method: method.to_string(),
        message: format!("failed to serialize model state: {e}"),
    })
}

/// Decode a payload produced by [`encode`].
pub fn decode<T: DeserializeOwned>(path: &Path, payload: &[u8]) -> ModelResult<T> {
    bincode::deserialize(payload).map_err(|e| ModelError::LoadFailure {
        path: path.display().to_string(),
        message: format!("corrupt model state: {e}"),
    })
}

/// Write a checkpoint, replacing any file at `path`.
pub fn write(path: &Path, method: Method, payload: Vec<u8>) -> ModelResult<()> {
    let envelope = Envelope {
        format: FORMAT_VERSION,
        method,
        payload,
    };
    let bytes = bincode::serialize(&envelope).map_err(|e| ModelError::TrainingFailure {
        method: method.to_string(),
        message: format!("failed to serialize checkpoint: {e}"),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ModelError::TrainingFailure {
            method: method.to_string(),
            message: format!("cannot create {}: {e}", parent.display()),
        })?;
    }
    std::fs::write(path, bytes).map_err(|e| ModelError::TrainingFailure {
        method: method.to_string(),
        message: format!("cannot write checkpoint {}: {e}", path.display()),
    })?;
    tracing::debug!(path = %path.display(), %method, "checkpoint written");
    Ok(())
}

/// Read a checkpoint written for `expected`, returning its payload.
pub fn read(path: &Path, expected: Method) -> ModelResult<Vec<u8>> {
    let load_failure = |message: String| ModelError::LoadFailure {
        path: path.display().to_string(),
        message,
    };
    let bytes = std::fs::read(path).map_err(|e| load_failure(e.to_string()))?;
    let envelope: Envelope = bincode::deserialize(&bytes)
        .map_err(|e| load_failure(format!("not a factrank checkpoint: {e}")))?;
    if envelope.format != FORMAT_VERSION {
        return Err(load_failure(format!(
            "checkpoint format {} is not supported (expected {FORMAT_VERSION})",
            envelope.format
        )));
    }
    if envelope.method != expected {
        return Err(load_failure(format!(
            "checkpoint was written by {}, not {expected}",
            envelope.method
        )));
    }
    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_payload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("model.ckpt");
        write(&path, Method::TransE, vec![1, 2, 3]).unwrap();
        assert_eq!(read(&path, Method::TransE).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn method_mismatch_is_a_load_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.ckpt");
        write(&path, Method::Sdv, vec![]).unwrap();
        let err = read(&path, Method::Hole).unwrap_err();
        assert!(matches!(err, ModelError::LoadFailure { .. }));
    }

    #[test]
    fn garbage_is_a_load_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.ckpt");
        std::fs::write(&path, b"definitely not bincode").unwrap();
        assert!(matches!(
            read(&path, Method::Sdv),
            Err(ModelError::LoadFailure { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_load_failure() {
        assert!(matches!(
            read(Path::new("/nonexistent/model.ckpt"), Method::Sdv),
            Err(ModelError::LoadFailure { .. })
        ));
    }
}
