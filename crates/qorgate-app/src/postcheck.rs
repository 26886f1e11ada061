//! Feature-specific validation run after the QoR gate.

use crate::case::Case;

pub trait PostCheck: Send + Sync {
    /// `Err` carries the reason the case failed.
    fn check(&self, case: &Case) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysPass;

impl PostCheck for AlwaysPass {
    fn check(&self, _case: &Case) -> Result<(), String> {
        Ok(())
    }
}

/// Every file listed under `[post_check] required_files` must exist in the
/// case workspace. A case that lists none passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFiles;

impl PostCheck for RequiredFiles {
    fn check(&self, case: &Case) -> Result<(), String> {
        let missing: Vec<&str> = case
            .meta
            .post_check
            .required_files
            .iter()
            .filter(|f| !case.workspace.join(f).exists())
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required files: {}", missing.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qorgate_types::{CaseMetaFile, PipelineKind, PostCheckSection};

    fn case_in(dir: &std::path::Path, required: &[&str]) -> Case {
        Case {
            name: "c".to_string(),
            source: dir.to_path_buf(),
            workspace: dir.to_path_buf(),
            kind: PipelineKind::SynthesisFlow,
            meta: CaseMetaFile {
                post_check: PostCheckSection {
                    required_files: required.iter().map(|s| s.to_string()).collect(),
                },
                ..CaseMetaFile::default()
            },
        }
    }

    #[test]
    fn nothing_required_passes() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RequiredFiles.check(&case_in(dir.path(), &[])), Ok(()));
        assert_eq!(AlwaysPass.check(&case_in(dir.path(), &["x"])), Ok(()));
    }

    #[test]
    fn reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.synthed.v"), "").unwrap();
        let err = RequiredFiles
            .check(&case_in(dir.path(), &["c.synthed.v", "c.lut.v"]))
            .unwrap_err();
        assert_eq!(err, "missing required files: c.lut.v");
    }
}
