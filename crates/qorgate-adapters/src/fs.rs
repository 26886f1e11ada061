//! Workspace and case-directory filesystem helpers.

use anyhow::{Context, bail};
use std::fs;
use std::path::{Path, PathBuf};

/// Immediate subdirectories of `root`, sorted by path.
pub fn list_case_dirs(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in
        fs::read_dir(root).with_context(|| format!("read case directory {}", root.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", root.display()))?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("read {}", src.display()))? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

/// Copy a case source directory into a fresh directory under `root`.
///
/// The destination is named after the source. An existing destination is an
/// error: every case owns its workspace exclusively.
pub fn prepare_workspace(source: &Path, root: &Path) -> anyhow::Result<PathBuf> {
    let name = source
        .file_name()
        .with_context(|| format!("case source {} has no name", source.display()))?;
    let dest = root.join(name);
    if dest.exists() {
        bail!("workspace {} already exists", dest.display());
    }
    copy_dir_all(source, &dest)?;
    Ok(dest)
}

pub fn write_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

pub fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Files under `dir` (recursively) with the given extension, sorted.
pub fn find_with_extension(dir: &Path, ext: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.{ext}", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut found = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
        found.push(entry.context("glob walk")?);
    }
    found.sort();
    Ok(found)
}
