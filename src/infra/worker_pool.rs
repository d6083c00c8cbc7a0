// ============================================================
// Layer 6 — Bounded Worker Pool
// ============================================================
// Runs file-level jobs on at most `pool_size` threads at once.
//
// Jobs are started in waves:
//
//   tasks: t0 t1 t2 t3 t4 t5 t6     pool_size = 3
//   wave 0: t0 t1 t2  → join all
//   wave 1: t3 t4 t5  → join all
//   wave 2: t6        → join
//
// A new wave only starts after every thread of the previous
// one has exited, so no more than `pool_size` jobs ever run
// together.
//
// Each thread builds its own worker state (e.g. a phrase
// extractor) through the factory closure and drops it on exit.
// That state is never shared between threads, so it need not
// be Send or Sync.
//
// Reference: Rust Book §16 (Fearless Concurrency)

use anyhow::{anyhow, Result};
use std::thread;

pub const DEFAULT_POOL_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedPool {
    pool_size: usize,
}

impl Default for BoundedPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

impl BoundedPool {
    /// A pool size of 0 is treated as 1.
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size: pool_size.max(1) }
    }

    /// Run `work` over every task; one result per task, in task order.
    ///
    /// A failing factory, a failing job or a panicking thread only
    /// fails that task's result.
    pub fn run<T, S, R, F, W>(&self, tasks: Vec<T>, factory: F, work: W) -> Vec<Result<R>>
    where
        T: Send,
        R: Send,
        F: Fn() -> Result<S> + Sync,
        W: Fn(&S, T) -> Result<R> + Sync,
    {
        let total       = tasks.len();
        let mut results = Vec::with_capacity(total);
        let mut pending = tasks.into_iter();
        let mut wave_no = 0usize;

        loop {
            let wave: Vec<T> = pending.by_ref().take(self.pool_size).collect();
            if wave.is_empty() {
                break;
            }
            tracing::debug!("Starting wave {} with {} jobs", wave_no, wave.len());

            let (factory, work) = (&factory, &work);
            let wave_results: Vec<Result<R>> = thread::scope(|scope| {
                let handles: Vec<_> = wave
                    .into_iter()
                    .map(|task| {
                        scope.spawn(move || {
                            let state = factory()?;
                            work(&state, task)
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or_else(|_| Err(anyhow!("worker thread panicked"))))
                    .collect()
            });

            results.extend(wave_results);
            wave_no += 1;
        }

        tracing::debug!("Pool finished {} jobs in {} waves", total, wave_no);
        results
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_results_follow_task_order() {
        let pool    = BoundedPool::new(3);
        let results = pool.run((0..10).collect(), || Ok(()), |_, t: usize| Ok(t * 2));
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|t| t * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_never_more_than_pool_size_running() {
        let running = AtomicUsize::new(0);
        let peak    = AtomicUsize::new(0);
        let pool    = BoundedPool::new(2);

        let results = pool.run(
            (0..7).collect::<Vec<usize>>(),
            || Ok(()),
            |_, _| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            },
        );

        assert_eq!(results.len(), 7);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_factory_runs_once_per_task() {
        let built = AtomicUsize::new(0);
        let pool  = BoundedPool::new(4);
        let _     = pool.run(
            vec!["a", "b", "c"],
            || {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(String::from("state"))
            },
            |state, t| Ok(format!("{state}-{t}")),
        );
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failures_stay_with_their_task() {
        let pool    = BoundedPool::new(2);
        let results = pool.run(
            vec![1, 2, 3],
            || Ok(()),
            |_, t: i32| if t == 2 { Err(anyhow!("bad task")) } else { Ok(t) },
        );
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_zero_pool_size_still_runs() {
        let pool = BoundedPool::new(0);
        assert_eq!(pool.run(vec![5], || Ok(()), |_, t: i32| Ok(t)).len(), 1);
    }
}
