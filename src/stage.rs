//! Staging disposable copies of consumer project templates

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;
use walkdir::WalkDir;

use crate::error::{HarnessError, HarnessResult};
use crate::process::run_logged;

/// A disposable working copy of one consumer template, with dependencies
/// and the freshly packed artifact installed.
///
/// Exactly one scenario owns a staged project. The owner calls
/// [`StagedProject::cleanup`] on success or [`StagedProject::keep`] on
/// failure; the directory is never reused.
#[derive(Debug)]
pub struct StagedProject {
    temp: TempDir,
}

impl StagedProject {
    /// Copy `template` into a fresh temp directory.
    pub fn stage(template: &Path) -> HarnessResult<Self> {
        if !template.is_dir() {
            return Err(HarnessError::TemplateMissing(template.to_path_buf()));
        }

        let temp = tempfile::Builder::new().prefix("pack-e2e-").tempdir()?;
        copy_template(template, temp.path())?;

        info!("staged {} at {}", template.display(), temp.path().display());
        Ok(Self { temp })
    }

    /// `npm install` the template's dependencies, then install the packed
    /// artifact on top of them.
    pub async fn install(&self, artifact: &Path) -> HarnessResult<()> {
        run_logged("npm", "npm", &["install"], self.path()).await?;

        let artifact_arg = artifact.to_string_lossy().into_owned();
        run_logged("npm", "npm", &["install", &artifact_arg], self.path()).await
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Delete the staged directory. Success path only.
    pub fn cleanup(self) -> HarnessResult<()> {
        self.temp.close()?;
        Ok(())
    }

    /// Persist the staged directory for post-mortem inspection and return
    /// its path. Failure path only.
    pub fn keep(self) -> PathBuf {
        self.temp.keep()
    }
}

/// Recursive copy of a template tree, skipping any `node_modules` left
/// behind by a developer poking at the template directly.
pub fn copy_template(src: &Path, dst: &Path) -> HarnessResult<()> {
    for entry in WalkDir::new(src)
        .into_iter()
        .filter_entry(|e| e.file_name() != "node_modules")
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_preserves_tree_and_skips_node_modules() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("src")).unwrap();
        fs::write(src.path().join("package.json"), "{}").unwrap();
        fs::write(src.path().join("src/index.js"), "console.log('hi')").unwrap();
        fs::create_dir_all(src.path().join("node_modules/leftover")).unwrap();
        fs::write(src.path().join("node_modules/leftover/x.js"), "").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_template(src.path(), dst.path()).unwrap();

        assert!(dst.path().join("package.json").is_file());
        assert!(dst.path().join("src/index.js").is_file());
        assert!(!dst.path().join("node_modules").exists());
    }

    #[test]
    fn missing_template_is_a_config_error() {
        let err = StagedProject::stage(Path::new("/nonexistent/template")).unwrap_err();
        assert!(matches!(err, HarnessError::TemplateMissing(_)));
    }

    #[test]
    fn cleanup_removes_the_staged_directory() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("package.json"), "{}").unwrap();

        let staged = StagedProject::stage(src.path()).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.join("package.json").is_file());

        staged.cleanup().unwrap();
        assert!(!staged_path.exists());
    }

    #[test]
    fn keep_persists_the_staged_directory() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("package.json"), "{}").unwrap();

        let staged = StagedProject::stage(src.path()).unwrap();
        let kept = staged.keep();
        assert!(kept.join("package.json").is_file());

        fs::remove_dir_all(kept).unwrap();
    }
}
