//! Building the distributable npm tarball once per run

use std::path::{Path, PathBuf};
use serde::Deserialize;
use tracing::info;

use crate::error::{HarnessError, HarnessResult};
use crate::process::run_captured;

/// One entry of `npm pack --json` output.
#[derive(Debug, Deserialize)]
struct PackReport {
    filename: String,
}

/// Run `npm pack` against the library project and return the absolute path
/// of the produced tarball.
///
/// Called exactly once per harness run, before any test case; the artifact
/// is installed read-only into every staged project and is left behind in
/// its temp directory when the run ends.
pub async fn pack(project_root: &Path) -> HarnessResult<PathBuf> {
    let dest = tempfile::Builder::new()
        .prefix("pack-e2e-artifact-")
        .tempdir()?
        .keep();

    info!("packing {}", project_root.display());

    let dest_arg = dest.to_string_lossy().into_owned();
    let stdout = run_captured(
        "npm",
        "npm",
        &["pack", "--json", "--pack-destination", &dest_arg],
        project_root,
    )
    .await?;

    let filename = parse_pack_output(&stdout)?;
    let artifact = dest.join(filename);

    info!("packed {}", artifact.display());
    Ok(artifact)
}

fn parse_pack_output(stdout: &[u8]) -> HarnessResult<String> {
    let reports: Vec<PackReport> = serde_json::from_slice(stdout)
        .map_err(|_| HarnessError::PackOutput(String::from_utf8_lossy(stdout).into_owned()))?;

    reports
        .into_iter()
        .next()
        .map(|r| r.filename)
        .ok_or_else(|| HarnessError::PackOutput("empty report".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_npm_pack_json() {
        let out = br#"[{"id":"widget@1.2.3","name":"widget","version":"1.2.3","filename":"widget-1.2.3.tgz","files":[],"entryCount":4,"bundled":[]}]"#;
        assert_eq!(parse_pack_output(out).unwrap(), "widget-1.2.3.tgz");
    }

    #[test]
    fn empty_report_is_an_error() {
        let err = parse_pack_output(b"[]").unwrap_err();
        assert!(matches!(err, HarnessError::PackOutput(_)));
    }

    #[test]
    fn non_json_output_is_an_error() {
        let err = parse_pack_output(b"npm WARN something\n").unwrap_err();
        assert!(matches!(err, HarnessError::PackOutput(_)));
    }
}
