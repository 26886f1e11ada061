#![no_main]

use libfuzzer_sys::fuzz_target;
use qorgate_domain::MetricSpec;
use qorgate_types::{Operator, PipelineKind};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let specs = [
        MetricSpec::for_pipeline(PipelineKind::MappingFlow, 6),
        MetricSpec::for_pipeline(PipelineKind::SynthesisFlow, 6),
        MetricSpec::for_pipeline(PipelineKind::SingleOperatorFlow(Operator::Balance), 6),
        MetricSpec::abc_mapping(),
    ];
    for spec in &specs {
        let all = spec.extract_available(text);
        // Re-extracting only what was found must succeed with the same values.
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        let again = qorgate_domain::extract(text, spec, &names[..]).expect("found metrics re-extract");
        assert_eq!(all, again);
    }
});
