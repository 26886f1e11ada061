//! Pipeline selection from declarative case metadata.

use qorgate_types::{Operator, PipelineKind};

/// Flow used when neither the global config nor the case names one.
pub const DEFAULT_FLOW: &str = "yosys";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error(
        "unknown flow {0:?} (expected ifpga|mapping, yosys|synthesis, balance|rewrite|refactor)"
    )]
    UnknownFlow(String),
}

/// Parse a flow name, accepting both the tool-flavoured and the generic spelling.
pub fn parse_flow(name: &str) -> Result<PipelineKind, SelectError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "ifpga" | "mapping" => Ok(PipelineKind::MappingFlow),
        "yosys" | "synthesis" => Ok(PipelineKind::SynthesisFlow),
        "balance" => Ok(PipelineKind::SingleOperatorFlow(Operator::Balance)),
        "rewrite" => Ok(PipelineKind::SingleOperatorFlow(Operator::Rewrite)),
        "refactor" => Ok(PipelineKind::SingleOperatorFlow(Operator::Refactor)),
        _ => Err(SelectError::UnknownFlow(name.to_string())),
    }
}

/// Choose the pipeline for one case.
///
/// Precedence: global override, then the case's own `flow`, then [`DEFAULT_FLOW`].
/// An unknown name is an error even if a lower-precedence value would be valid.
pub fn select_pipeline(
    case_flow: Option<&str>,
    global_override: Option<&str>,
) -> Result<PipelineKind, SelectError> {
    let name = global_override.or(case_flow).unwrap_or(DEFAULT_FLOW);
    parse_flow(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_synthesis() {
        assert_eq!(
            select_pipeline(None, None).unwrap(),
            PipelineKind::SynthesisFlow
        );
    }

    #[test]
    fn case_value_used_without_override() {
        assert_eq!(
            select_pipeline(Some("ifpga"), None).unwrap(),
            PipelineKind::MappingFlow
        );
    }

    #[test]
    fn override_wins_over_case_value() {
        assert_eq!(
            select_pipeline(Some("ifpga"), Some("rewrite")).unwrap(),
            PipelineKind::SingleOperatorFlow(Operator::Rewrite)
        );
    }

    #[test]
    fn aliases_resolve_to_same_kind() {
        assert_eq!(parse_flow("mapping"), parse_flow("ifpga"));
        assert_eq!(parse_flow("Synthesis"), parse_flow("yosys"));
        assert_eq!(
            parse_flow(" refactor ").unwrap(),
            PipelineKind::SingleOperatorFlow(Operator::Refactor)
        );
        assert_eq!(
            parse_flow("balance").unwrap(),
            PipelineKind::SingleOperatorFlow(Operator::Balance)
        );
    }

    #[test]
    fn unknown_flow_fails_fast() {
        let err = select_pipeline(Some("vivado"), None).unwrap_err();
        assert_eq!(err, SelectError::UnknownFlow("vivado".to_string()));
        assert!(err.to_string().contains("vivado"));
    }

    #[test]
    fn unknown_override_is_not_masked_by_valid_case_flow() {
        assert!(select_pipeline(Some("yosys"), Some("bogus")).is_err());
    }
}
