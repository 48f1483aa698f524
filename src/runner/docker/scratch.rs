//! Per-invocation scratch directory mounted at `/component-io`

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;

use crate::constants::{INPUT_FILE_NAME, OUTPUT_FILE_NAME, SCRATCH_PREFIX};
use crate::error::ComponentError;

/// Removed on drop; removal failures are logged, never raised
#[derive(Debug)]
pub(crate) struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub(crate) fn create(root: Option<&Path>) -> Result<Self, ComponentError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|e| scratch_error(root, e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| scratch_error(root.unwrap_or_else(|| Path::new("<tmp>")), e))?;

        // The container user is usually not the host user
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o777))
                .map_err(|e| scratch_error(dir.path(), e))?;
        }

        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "Created scratch directory");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn input_path(&self) -> PathBuf {
        self.path.join(INPUT_FILE_NAME)
    }

    pub(crate) fn output_path(&self) -> PathBuf {
        self.path.join(OUTPUT_FILE_NAME)
    }

    pub(crate) fn write_input<T: Serialize>(&self, payload: &T) -> Result<(), ComponentError> {
        let bytes = serde_json::to_vec(payload).map_err(|e| {
            ComponentError::invalid_field("payload", format!("not serializable: {}", e))
        })?;
        let path = self.input_path();
        fs::write(&path, bytes).map_err(|e| scratch_error(&path, e))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed scratch directory"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove scratch directory"
            ),
        }
    }
}

fn scratch_error(path: &Path, err: std::io::Error) -> ComponentError {
    ComponentError::resource_unavailable(
        format!("Scratch directory unavailable at {}: {}", path.display(), err),
        Some("scratch-dir".to_string()),
    )
    .with_cause(err)
}
