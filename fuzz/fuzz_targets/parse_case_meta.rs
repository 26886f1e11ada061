#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(meta) = qorgate_app::parse_case_meta(s) {
            let _ = qorgate_domain::select_pipeline(meta.flow.flow.as_deref(), None);
        }
    }
});
