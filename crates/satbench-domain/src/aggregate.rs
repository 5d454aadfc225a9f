use crate::{BenchmarkCase, CaseVerdict, ExecutionOutcome, accuracy_pct, judge, summarize_times};
use satbench_types::{Category, GroupSummary};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub size_key: String,
    pub category: Category,
}

impl GroupKey {
    pub fn of(case: &BenchmarkCase) -> Self {
        Self {
            size_key: case.size_key.clone(),
            category: case.category,
        }
    }
}

/// Running totals for one group.
///
/// `total == correct + incorrect + timeouts == durations.len()` holds after
/// every call to [`GroupStats::record`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    durations: Vec<f64>,
    total: u64,
    correct: u64,
    incorrect: u64,
    timeouts: u64,
}

impl GroupStats {
    pub fn record(&mut self, verdict: CaseVerdict, duration_secs: f64) {
        self.durations.push(duration_secs);
        self.total += 1;
        match verdict {
            CaseVerdict::Correct => self.correct += 1,
            CaseVerdict::Incorrect => self.incorrect += 1,
            CaseVerdict::TimedOut => self.timeouts += 1,
        }
        debug_assert_eq!(self.total, self.correct + self.incorrect + self.timeouts);
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn correct(&self) -> u64 {
        self.correct
    }

    pub fn incorrect(&self) -> u64 {
        self.incorrect
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn summarize(&self) -> GroupSummary {
        let (average_time, median_time) = match summarize_times(&self.durations) {
            Ok(t) => (t.mean, t.median),
            Err(_) => (0.0, 0.0),
        };
        GroupSummary {
            average_time,
            median_time,
            accuracy: accuracy_pct(self.total, self.correct, self.timeouts),
            total: self.total,
            correct: self.correct,
            incorrect: self.incorrect,
            timeouts: self.timeouts,
        }
    }
}

/// Owns every [`GroupStats`] of a run.
///
/// Built at run start, mutated only through [`Aggregator::record`], and
/// consumed by [`Aggregator::finalize`].
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: BTreeMap<GroupKey, GroupStats>,
    cases: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, case: &BenchmarkCase, outcome: &ExecutionOutcome) -> CaseVerdict {
        let verdict = judge(case.category, outcome);
        self.groups
            .entry(GroupKey::of(case))
            .or_default()
            .record(verdict, outcome.duration.as_secs_f64());
        self.cases += 1;
        verdict
    }

    pub fn cases(&self) -> u64 {
        self.cases
    }

    pub fn get(&self, key: &GroupKey) -> Option<&GroupStats> {
        self.groups.get(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &GroupStats)> {
        self.groups.iter()
    }

    /// size key -> category -> summary
    pub fn finalize(self) -> BTreeMap<String, BTreeMap<Category, GroupSummary>> {
        let mut out: BTreeMap<String, BTreeMap<Category, GroupSummary>> = BTreeMap::new();
        for (key, stats) in self.groups {
            out.entry(key.size_key)
                .or_default()
                .insert(key.category, stats.summarize());
        }
        out
    }
}
