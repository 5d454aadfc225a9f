#![no_main]

use libfuzzer_sys::fuzz_target;
use satbench_domain::{CaseVerdict, ExecutionOutcome, judge};
use satbench_types::{Category, MARKER_SAT, MARKER_UNSAT};
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let output = String::from_utf8_lossy(data).into_owned();
    let outcome = ExecutionOutcome {
        output: output.clone(),
        duration: Duration::from_millis(1),
        timed_out: false,
    };

    let sat = judge(Category::Satisfiable, &outcome);
    assert_eq!(sat == CaseVerdict::Correct, output.contains(MARKER_SAT));

    let unsat = judge(Category::Unsatisfiable, &outcome);
    assert_eq!(unsat == CaseVerdict::Correct, output.contains(MARKER_UNSAT));
});
