//! One-OS-thread-per-pipeline launcher (spec §5): each `PipelineConfig` runs
//! independently with no shared state between pipelines, the launcher joins
//! every thread at shutdown and surfaces the first error encountered.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::error::{EngineError, EngineResult};

/// Builds and runs one pipeline to completion on its own thread. Boxed so
/// the launcher stays decoupled from how a concrete `Engine` (model session,
/// tracker, I/O adapters) gets assembled — that wiring is the CLI/embedding
/// application's job, not the launcher's.
pub type PipelineRunner = Box<dyn FnOnce(Arc<AtomicBool>) -> EngineResult<()> + Send>;

/// Runs every pipeline runner on its own thread, waits for all of them, and
/// returns the first error encountered, if any. The shared `cancelled` flag
/// lets a caller (e.g. a Ctrl-C handler) request a coordinated shutdown of
/// every pipeline at once; it is also set once all threads have finished so
/// a caller polling it after `run_all` returns sees a consistent state.
pub fn run_all(runners: Vec<PipelineRunner>, cancelled: Arc<AtomicBool>) -> EngineResult<()> {
    let handles: Vec<_> = runners
        .into_iter()
        .map(|runner| {
            let cancelled = cancelled.clone();
            thread::spawn(move || runner(cancelled))
        })
        .collect();

    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::error!("pipeline failed: {err}");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
            Err(_) => {
                log::error!("pipeline thread panicked");
                if first_error.is_none() {
                    first_error = Some(EngineError::Initialization("pipeline thread panicked".into()));
                }
            }
        }
    }

    cancelled.store(true, Ordering::Relaxed);
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn all_pipelines_run_and_ok_is_returned_when_none_fail() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let runners: Vec<PipelineRunner> = (0..3)
            .map(|i| {
                let completed = completed.clone();
                Box::new(move |_cancelled: Arc<AtomicBool>| {
                    completed.lock().unwrap().push(i);
                    Ok(())
                }) as PipelineRunner
            })
            .collect();

        let result = run_all(runners, Arc::new(AtomicBool::new(false)));
        assert!(result.is_ok());
        let mut done = completed.lock().unwrap().clone();
        done.sort();
        assert_eq!(done, vec![0, 1, 2]);
    }

    #[test]
    fn first_error_is_surfaced_and_other_pipelines_still_run() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let ok_completed = completed.clone();
        let runners: Vec<PipelineRunner> = vec![
            Box::new(move |_cancelled| {
                ok_completed.lock().unwrap().push("ok");
                Ok(())
            }),
            Box::new(|_cancelled| Err(EngineError::Config("bad zone".into()))),
        ];

        let result = run_all(runners, Arc::new(AtomicBool::new(false)));
        assert!(result.is_err());
        assert_eq!(completed.lock().unwrap().as_slice(), ["ok"]);
    }

    #[test]
    fn cancelled_flag_is_set_after_all_pipelines_finish() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let runners: Vec<PipelineRunner> = vec![Box::new(|_cancelled| Ok(()))];
        run_all(runners, cancelled.clone()).unwrap();
        assert!(cancelled.load(Ordering::Relaxed));
    }
}
