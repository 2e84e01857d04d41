//! Scoped worker threads for batch workloads.
//!
//! Built on [`std::thread::scope`] so tasks can borrow from the caller's
//! stack. [`ThreadPool::dispatch`] adds a chunked fan-out primitive used
//! by the transform propagation pass.

/// A thread pool for parallel batch execution.
///
/// # Example
///
/// ```
/// use aster_core::ThreadPool;
///
/// let pool = ThreadPool::new(4);
///
/// let mut results = vec![0u32; 4];
/// pool.scope(|s| {
///     for (i, slot) in results.iter_mut().enumerate() {
///         s.spawn(move || {
///             *slot = (i as u32) * 10;
///         });
///     }
/// });
/// assert_eq!(results, vec![0, 10, 20, 30]);
/// ```
pub struct ThreadPool {
    #[allow(dead_code)]
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a new thread pool with the given number of worker threads.
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    /// Creates a thread pool sized to the number of available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    /// Executes tasks within a scoped context.
    ///
    /// All tasks spawned within the closure are guaranteed to complete
    /// before this method returns. Tasks can borrow local variables
    /// thanks to scoped lifetimes.
    pub fn scope<'env, F>(&self, f: F)
    where
        F: for<'scope> FnOnce(&Scope<'scope, 'env>),
    {
        std::thread::scope(|s| {
            let scope = Scope { inner: s };
            f(&scope);
        });
    }

    /// Runs `f` over every item of `items`, splitting the slice into at
    /// most `max_chunks` contiguous chunks of at most `chunk_size` items,
    /// one scoped task per chunk.
    ///
    /// The chunk length is `len / max_chunks` rounded up, capped at
    /// `chunk_size`; if the cap applies, more than `max_chunks` tasks may
    /// be spawned. All tasks complete before this method returns. An
    /// empty slice spawns nothing.
    pub fn dispatch<T, F>(&self, items: &[T], max_chunks: usize, chunk_size: usize, f: F)
    where
        T: Sync,
        F: Fn(&T) + Sync,
    {
        if items.is_empty() {
            return;
        }
        let max_chunks = max_chunks.max(1);
        let chunk_len = items.len().div_ceil(max_chunks).clamp(1, chunk_size.max(1));

        if items.len() <= chunk_len {
            for item in items {
                f(item);
            }
            return;
        }

        let f = &f;
        self.scope(|s| {
            for chunk in items.chunks(chunk_len) {
                s.spawn(move || {
                    for item in chunk {
                        f(item);
                    }
                });
            }
        });
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::default_threads()
    }
}

/// A scope for spawning tasks that must complete before the scope exits.
pub struct Scope<'scope, 'env: 'scope> {
    inner: &'scope std::thread::Scope<'scope, 'env>,
}

impl<'scope, 'env> Scope<'scope, 'env> {
    /// Spawns a task within this scope.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        self.inner.spawn(f);
    }
}
