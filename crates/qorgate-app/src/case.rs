//! One regression case: identity, workspace and metadata.

use qorgate_domain::{SelectError, select_pipeline};
use qorgate_types::{CASE_META_FILE, CaseMetaFile, PipelineKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("case source {0} has no directory name")]
    Unnamed(PathBuf),

    #[error("case {case}: missing {path}")]
    MissingMeta { case: String, path: PathBuf },

    #[error("case {case}: cannot read {path}: {source}")]
    Io {
        case: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("case {case}: invalid {path}: {source}")]
    InvalidMeta {
        case: String,
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("case {case}: {source}")]
    Flow {
        case: String,
        #[source]
        source: SelectError,
    },
}

pub fn parse_case_meta(text: &str) -> Result<CaseMetaFile, toml::de::Error> {
    toml::from_str(text)
}

/// A case owns its workspace for its whole lifetime; the workspace path is
/// derived from the case name and the run directory, so names are unique
/// within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub name: String,
    pub source: PathBuf,
    pub workspace: PathBuf,
    pub kind: PipelineKind,
    pub meta: CaseMetaFile,
}

impl Case {
    /// Read the metadata of `source` and select its pipeline.
    ///
    /// The workspace is `<run_dir>/<case name>`; nothing is copied here.
    pub fn load(
        source: &Path,
        run_dir: &Path,
        flow_override: Option<&str>,
    ) -> Result<Self, CaseError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CaseError::Unnamed(source.to_path_buf()))?;

        let meta_path = source.join(CASE_META_FILE);
        if !meta_path.is_file() {
            return Err(CaseError::MissingMeta {
                case: name,
                path: meta_path,
            });
        }
        let text = std::fs::read_to_string(&meta_path).map_err(|source| CaseError::Io {
            case: name.clone(),
            path: meta_path.clone(),
            source,
        })?;
        let meta = parse_case_meta(&text).map_err(|source| CaseError::InvalidMeta {
            case: name.clone(),
            path: meta_path.clone(),
            source,
        })?;

        Self::from_meta(name, source, run_dir, meta, flow_override)
    }

    pub fn from_meta(
        name: String,
        source: &Path,
        run_dir: &Path,
        meta: CaseMetaFile,
        flow_override: Option<&str>,
    ) -> Result<Self, CaseError> {
        let kind = select_pipeline(meta.flow.flow.as_deref(), flow_override).map_err(|source| {
            CaseError::Flow {
                case: name.clone(),
                source,
            }
        })?;

        Ok(Self {
            workspace: run_dir.join(&name),
            name,
            source: source.to_path_buf(),
            kind,
            meta,
        })
    }

    /// `<name><suffix>`, e.g. `artifact(".opt.aig")`.
    pub fn artifact(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.name)
    }

    pub fn golden(&self) -> &BTreeMap<String, i64> {
        &self.meta.qor
    }

    pub fn verification_disabled(&self) -> bool {
        self.meta.flow.disable_verification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qorgate_types::Operator;

    fn write_case(root: &Path, name: &str, meta: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CASE_META_FILE), meta).unwrap();
        dir
    }

    #[test]
    fn loads_metadata_and_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_case(
            tmp.path(),
            "adder",
            "[flow]\nflow = \"ifpga\"\ndisable_verification = true\n\n[qor]\narea = 100\nlevel = 12\n",
        );
        let case = Case::load(&src, Path::new("/runs/1"), None).unwrap();
        assert_eq!(case.name, "adder");
        assert_eq!(case.workspace, PathBuf::from("/runs/1/adder"));
        assert_eq!(case.kind, PipelineKind::MappingFlow);
        assert!(case.verification_disabled());
        assert_eq!(case.golden().get("area"), Some(&100));
        assert_eq!(case.artifact(".opt.aig"), "adder.opt.aig");
    }

    #[test]
    fn global_override_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_case(tmp.path(), "mux", "[flow]\nflow = \"ifpga\"\n");
        let case = Case::load(&src, tmp.path(), Some("rewrite")).unwrap();
        assert_eq!(case.kind, PipelineKind::SingleOperatorFlow(Operator::Rewrite));
    }

    #[test]
    fn missing_metadata_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("bare");
        std::fs::create_dir_all(&src).unwrap();
        let err = Case::load(&src, tmp.path(), None).unwrap_err();
        assert!(matches!(err, CaseError::MissingMeta { .. }), "got {err:?}");
    }

    #[test]
    fn unknown_flow_fails_fast() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_case(tmp.path(), "x", "[flow]\nflow = \"vivado\"\n");
        let err = Case::load(&src, tmp.path(), None).unwrap_err();
        assert!(matches!(err, CaseError::Flow { .. }));
        assert!(err.to_string().contains("vivado"));
    }

    #[test]
    fn malformed_metadata_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_case(tmp.path(), "x", "[qor]\narea = \"lots\"\n");
        let err = Case::load(&src, tmp.path(), None).unwrap_err();
        assert!(matches!(err, CaseError::InvalidMeta { .. }));
    }

    #[test]
    fn empty_metadata_defaults_to_synthesis() {
        let meta = parse_case_meta("").unwrap();
        let case = Case::from_meta("c".into(), Path::new("/src/c"), Path::new("/ws"), meta, None)
            .unwrap();
        assert_eq!(case.kind, PipelineKind::SynthesisFlow);
        assert!(case.golden().is_empty());
    }
}
