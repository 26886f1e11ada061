//! Fan independent cases out over a fixed-size worker pool.

use anyhow::Context;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

/// Runs one job per item on at most `jobs` worker threads and returns the
/// results in input order once every job has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    jobs: usize,
}

impl Scheduler {
    pub fn new(jobs: usize) -> Self {
        Self { jobs: jobs.max(1) }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn run<T, O, F>(&self, items: &[T], job: F) -> anyhow::Result<Vec<O>>
    where
        T: Sync,
        O: Send,
        F: Fn(&T) -> O + Sync + Send,
    {
        if self.jobs == 1 || items.len() <= 1 {
            return Ok(items.iter().map(job).collect());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("qorgate-worker-{i}"))
            .build()
            .context("failed to build worker pool")?;

        Ok(pool.install(|| items.par_iter().map(&job).collect()))
    }
}
