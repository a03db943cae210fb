//! Canonical paths derived from the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use super::config::{ScribeConfig, write_config};

/// Every location scribe reads or writes, relative to one explicit root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub knowledge_dir: PathBuf,
    pub outlines_dir: PathBuf,
    pub chapters_dir: PathBuf,
    pub scribe_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub state_dir: PathBuf,
    pub run_state_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let scribe_dir = root.join(".scribe");
        let state_dir = scribe_dir.join("state");
        Self {
            config_path: root.join("scribe.toml"),
            knowledge_dir: root.join("knowledge"),
            outlines_dir: root.join("outlines"),
            chapters_dir: root.join("chapters"),
            runs_dir: scribe_dir.join("runs"),
            run_state_path: state_dir.join("run_state.json"),
            state_dir,
            scribe_dir,
            root,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite an existing `scribe.toml`.
    pub force: bool,
}

/// Create the project directories and a default `scribe.toml`.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);
    if paths.config_path.exists() && !options.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            paths.config_path.display()
        );
    }
    for dir in [
        &paths.knowledge_dir,
        &paths.outlines_dir,
        &paths.chapters_dir,
        &paths.runs_dir,
        &paths.state_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    write_config(&paths.config_path, &ScribeConfig::default())?;
    info!(root = %root.display(), "initialized project");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_the_root() {
        let paths = ProjectPaths::new("/story");
        assert_eq!(paths.outlines_dir, PathBuf::from("/story/outlines"));
        assert_eq!(paths.chapters_dir, PathBuf::from("/story/chapters"));
        assert_eq!(
            paths.run_state_path,
            PathBuf::from("/story/.scribe/state/run_state.json")
        );
    }

    /// Verifies init refuses to clobber an existing config unless forced.
    #[test]
    fn init_requires_force_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions::default()).expect("init");
        assert!(paths.config_path.exists());
        assert!(paths.knowledge_dir.is_dir());

        let err = init_project(temp.path(), &InitOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        init_project(temp.path(), &InitOptions { force: true }).expect("forced init");
    }
}
