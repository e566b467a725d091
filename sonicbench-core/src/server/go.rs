// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Optional Go responder, built only when a Go toolchain is on the host.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::ServerError;

/// Check whether `go` can be executed.
pub fn toolchain_available() -> bool {
    Command::new("go")
        .arg("version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Build `source` into `out_dir` and return the binary path.
pub fn build(source: &Path, out_dir: &Path) -> Result<PathBuf, ServerError> {
    if !source.exists() {
        return Err(ServerError::BuildFailed {
            source_path: source.to_path_buf(),
            reason: "source file not found".to_string(),
        });
    }

    let binary = out_dir.join("responder");
    let output = Command::new("go")
        .arg("build")
        .arg("-o")
        .arg(&binary)
        .arg(source)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ServerError::BuildFailed {
            source_path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ServerError::BuildFailed {
            source_path: source.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    tracing::info!(
        source = %source.display(),
        binary = %binary.display(),
        "Built Go responder"
    );
    Ok(binary)
}
