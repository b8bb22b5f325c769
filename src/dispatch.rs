use std::thread::JoinHandle;

use crate::error::Result;
use crate::grid::ImageId;

/// Fire-and-forget runner for submission callbacks.
///
/// Each task works on its own copy of the arrangement. The outcome of a callback is logged on the
/// worker thread and is otherwise not reported back.
#[derive(Debug, Default)]
pub struct Dispatcher {
    tasks: Vec<JoinHandle<()>>,
    spawned: usize,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, arrangement: &ndarray::Array2<ImageId>, callback: F) -> Result<()>
    where
        F: FnOnce(ndarray::Array2<ImageId>) -> anyhow::Result<()> + Send + 'static,
    {
        let copy = arrangement.clone();
        let serial = self.spawned;

        let handle = std::thread::Builder::new()
            .name(format!("submit-{}", serial))
            .spawn(move || {
                let start_time = instant::Instant::now();
                match callback(copy) {
                    Ok(()) => log::info!(
                        "submission {} finished in {:?}",
                        serial,
                        instant::Instant::now() - start_time
                    ),
                    Err(err) => log::warn!("submission {} failed: {:#}", serial, err),
                }
            })?;

        self.spawned += 1;
        self.tasks.push(handle);
        Ok(())
    }

    /// Drops handles of finished tasks without blocking.
    pub fn poll(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.is_finished());

        self.tasks = running;
        finished.into_iter().for_each(reap);
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Blocks until every outstanding task has finished.
    pub fn join_all(&mut self) {
        if !self.tasks.is_empty() {
            log::info!("waiting for {} submissions", self.tasks.len());
        }
        self.tasks.drain(..).for_each(reap);
    }
}

fn reap(task: JoinHandle<()>) {
    let name = task.thread().name().unwrap_or("submit").to_owned();
    if task.join().is_err() {
        log::error!("{} panicked", name);
    }
}
