/// Fixed-size worker pool for tile tasks
///
/// Wraps a dedicated rayon pool with the two synchronization styles the
/// pipeline needs:
/// - `push_task` + `wait_tasks_finish`: fire-and-forget `'static` closures
///   and a barrier that yields until the outstanding counter drops to zero
/// - `scope`: tasks that borrow frame data, joined before `scope` returns
///
/// There is no cancellation and no per-task result channel. Tasks always run
/// to completion.
use crate::error::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct ThreadPool {
    pool: rayon::ThreadPool,
    pending: Arc<AtomicUsize>,
}

/// Decrements the outstanding-task counter when dropped, including on unwind,
/// so a panicking task cannot wedge `wait_tasks_finish`.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ThreadPool {
    /// Build a pool with `threads` workers; 0 means one per hardware thread.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("raster-worker-{i}"))
            .panic_handler(|_| log::error!("raster worker task panicked"))
            .build()?;

        log::debug!("thread pool started with {} workers", pool.current_num_threads());

        Ok(Self {
            pool,
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Number of pushed tasks that have not finished yet.
    #[inline]
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Queue a task on the pool.
    pub fn push_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard(Arc::clone(&self.pending));
        self.pool.spawn(move || {
            let _guard = guard;
            task();
        });
    }

    /// Yield until every task queued with `push_task` has finished.
    ///
    /// Must not be called from inside a pool task: the caller would wait on
    /// itself.
    pub fn wait_tasks_finish(&self) {
        while self.pending.load(Ordering::Acquire) > 0 {
            std::thread::yield_now();
        }
    }

    /// Run `op` with a scope whose tasks may borrow from the caller's stack.
    /// Returns once `op` and every task it pushed have completed.
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&TaskScope<'_, 'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(|s| op(&TaskScope { inner: s }))
    }
}

/// Handle for pushing borrowed tasks inside `ThreadPool::scope`.
pub struct TaskScope<'a, 'scope> {
    inner: &'a rayon::Scope<'scope>,
}

impl<'scope> TaskScope<'_, 'scope> {
    pub fn push_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        self.inner.spawn(move |_| task());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn explicit_thread_count() {
        let pool = ThreadPool::new(3).unwrap();
        assert_eq!(pool.thread_count(), 3);
    }

    #[test]
    fn wait_blocks_until_all_tasks_ran() {
        let pool = ThreadPool::new(4).unwrap();
        let sum = Arc::new(AtomicU64::new(0));

        for i in 1..=200u64 {
            let sum = Arc::clone(&sum);
            pool.push_task(move || {
                sum.fetch_add(i, Ordering::Relaxed);
            });
        }
        pool.wait_tasks_finish();

        assert_eq!(sum.load(Ordering::Relaxed), 200 * 201 / 2);
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn wait_with_no_tasks_returns() {
        let pool = ThreadPool::new(1).unwrap();
        pool.wait_tasks_finish();
        pool.wait_tasks_finish();
    }

    #[test]
    fn panicking_task_still_releases_barrier() {
        let pool = ThreadPool::new(2).unwrap();
        pool.push_task(|| panic!("boom"));
        pool.push_task(|| {});
        pool.wait_tasks_finish();
        assert_eq!(pool.pending_tasks(), 0);
    }

    #[test]
    fn scoped_tasks_write_disjoint_chunks() {
        let pool = ThreadPool::new(4).unwrap();
        let mut data = vec![0u32; 1000];

        pool.scope(|s| {
            for (i, chunk) in data.chunks_mut(64).enumerate() {
                s.push_task(move || chunk.fill(i as u32));
            }
        });

        for (i, v) in data.iter().enumerate() {
            assert_eq!(*v, (i / 64) as u32);
        }
    }
}
