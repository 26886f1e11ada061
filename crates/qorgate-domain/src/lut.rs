//! LUT accounting: the weighted area model and fanin counting over netlists.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Inputs a single physical LUT covers at unit cost.
const NATIVE_LUT_INPUTS: usize = 6;

/// Widest LUT a tool log may report; wider fanins are corrupt input.
pub const MAX_LUT_INPUTS: usize = 64;

/// Area of a LUT histogram (index 0 = 1-input LUTs).
///
/// LUTs with up to six inputs cost one unit each. A wider LUT at index
/// `6 + j` costs `2^j` units.
pub fn weighted_lut_area(counts: &[u64]) -> u64 {
    let narrow: u64 = counts.iter().take(NATIVE_LUT_INPUTS).sum();
    let wide: u64 = counts
        .iter()
        .skip(NATIVE_LUT_INPUTS)
        .enumerate()
        .map(|(j, n)| n.saturating_mul(1u64 << j.min(63)))
        .fold(0u64, u64::saturating_add);
    narrow.saturating_add(wide)
}

/// Area of a histogram counted from a mapped netlist at LUT size `lut_inputs`.
///
/// Every LUT costs one unit, except that a 7-input device spends two on each
/// 7-input LUT.
pub fn netlist_lut_area(counts: &[u64], lut_inputs: usize) -> u64 {
    let plain = counts.iter().fold(0u64, |acc, n| acc.saturating_add(*n));
    let doubled = match lut_inputs {
        7 => counts.get(6).copied().unwrap_or(0),
        _ => 0,
    };
    plain.saturating_add(doubled)
}

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    // plain identifiers, or escaped identifiers terminated by whitespace
    Regex::new(r"[a-zA-Z_][\w$]*|\\\S+\s").expect("identifier pattern must compile")
});

/// Count LUTs by fanin in a mapped netlist written as continuous assignments.
///
/// Every `assign` line is one LUT whose fanin is the number of distinct
/// identifiers on its right-hand side. Constant drivers and plain buffers are
/// not LUTs. The histogram has at least `lut_inputs` buckets and grows if a
/// wider assignment shows up.
pub fn count_lut_fanins(netlist: &str, lut_inputs: usize) -> Vec<u64> {
    let mut counts = vec![0u64; lut_inputs];

    for line in netlist.lines() {
        if !line.contains("assign") || line.contains("1'b") {
            continue;
        }
        let Some(expr) = line.rsplit('=').next() else {
            continue;
        };
        let inputs: BTreeSet<&str> = IDENTIFIER
            .find_iter(expr)
            .map(|m| m.as_str().trim_end())
            .collect();
        let fanin = inputs.len();
        if fanin == 0 || (fanin == 1 && !expr.contains('~')) {
            continue;
        }
        if fanin > counts.len() {
            counts.resize(fanin, 0);
        }
        counts[fanin - 1] += 1;
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn k6_area_is_plain_sum() {
        assert_eq!(weighted_lut_area(&[1, 2, 3, 4, 5, 6]), 21);
    }

    #[test]
    fn netlist_area_doubles_seven_input_luts_only_at_k7() {
        let counts = [1, 2, 3, 0, 0, 4, 5];
        assert_eq!(netlist_lut_area(&counts, 7), 15 + 5);
        assert_eq!(netlist_lut_area(&counts, 8), 15);
        assert_eq!(netlist_lut_area(&[1, 2, 3, 0, 0, 4], 6), 10);
        assert_eq!(netlist_lut_area(&[], 7), 0);
    }

    #[test]
    fn k7_area_matches_closed_form() {
        let counts = [1, 2, 3, 4, 5, 6, 7];
        let expected: u64 = counts[..6].iter().sum::<u64>() + counts[6];
        assert_eq!(weighted_lut_area(&counts), expected);
    }

    #[test]
    fn empty_histogram_has_zero_area() {
        assert_eq!(weighted_lut_area(&[]), 0);
    }

    #[test]
    fn counts_fanins_and_skips_constants_and_buffers() {
        let netlist = "\
module top(a, b, c, d, y0, y1, y2, y3, y4);
  assign y0 = a & b;
  assign y1 = (a & b) | (c ^ d);
  assign y2 = 1'b0;
  assign y3 = a;
  assign y4 = ~c;
  assign \\esc[0]  = a | d;
endmodule
";
        let counts = count_lut_fanins(netlist, 6);
        assert_eq!(counts, vec![1, 2, 0, 1, 0, 0]);
    }

    #[test]
    fn wide_assignment_grows_histogram() {
        let netlist = "assign y = a & b & c & d & e & f & g;\n";
        let counts = count_lut_fanins(netlist, 6);
        assert_eq!(counts.len(), 7);
        assert_eq!(counts[6], 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn area_is_monotonic_in_every_bucket(
            counts in proptest::collection::vec(0u64..100_000, 0..9),
            bump in 1u64..1000,
            idx in 0usize..9,
        ) {
            prop_assume!(idx < counts.len());
            let before = weighted_lut_area(&counts);
            let mut more = counts.clone();
            more[idx] += bump;
            prop_assert!(weighted_lut_area(&more) > before);
        }

        #[test]
        fn k6_and_k7_follow_closed_form(counts in proptest::collection::vec(0u64..100_000, 6..=7)) {
            let narrow: u64 = counts[..6].iter().sum();
            let wide: u64 = counts.get(6).copied().unwrap_or(0);
            prop_assert_eq!(weighted_lut_area(&counts), narrow + wide);
        }
    }
}
