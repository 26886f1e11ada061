#![no_main]

use libfuzzer_sys::fuzz_target;
use qorgate_domain::{count_lut_fanins, netlist_lut_area, weighted_lut_area};

fuzz_target!(|data: &[u8]| {
    if let Ok(netlist) = std::str::from_utf8(data) {
        let luts = count_lut_fanins(netlist, 6);
        assert_eq!(luts.len(), 6);
        let _ = weighted_lut_area(&luts);
        let _ = netlist_lut_area(&luts, 7);
    }
});
