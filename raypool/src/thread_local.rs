//! Per-thread storage.
//!
//! [`ThreadLocal`] gives every thread that touches it its own lazily
//! created instance of a value, e.g. a scratch buffer or a sampler clone
//! per rendering thread. Unlike `thread_local!`, instances belong to the
//! container: they can be visited after the parallel work is done (to
//! merge per-thread results) and are dropped with it.

use crate::available_cores;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;
use std::sync::{PoisonError, RwLock};
use std::thread::{self, ThreadId};

/// Table slots allocated per expected thread.
const SLOTS_PER_THREAD: usize = 4;

/// One thread's instance.
struct Entry<T> {
    owner: ThreadId,
    /// Heap allocation owned by the entry, so the instance keeps its
    /// address when the table grows.
    value: NonNull<T>,
}

impl<T> Entry<T> {
    fn new(owner: ThreadId, value: T) -> Self {
        Self {
            owner,
            value: NonNull::from(Box::leak(Box::new(value))),
        }
    }
}

impl<T> Drop for Entry<T> {
    fn drop(&mut self) {
        // Safety: `value` came from `Box::leak` and is dropped exactly once.
        drop(unsafe { Box::from_raw(self.value.as_ptr()) });
    }
}

/// Open-addressing hash table keyed by thread id.
///
/// Entries are never removed, so a probe sequence that reaches an empty
/// slot proves the key is absent.
struct Table<T> {
    slots: Vec<Option<Entry<T>>>,
    len: usize,
}

impl<T> Table<T> {
    fn with_slots(slots: usize) -> Self {
        let slots = slots.max(1).next_power_of_two();
        Self {
            slots: (0..slots).map(|_| None).collect(),
            len: 0,
        }
    }

    /// Probe sequence for `hash`: triangular steps, which visit every slot
    /// of a power-of-two table exactly once.
    fn probe(&self, hash: u64) -> impl Iterator<Item = usize> {
        let mask = self.slots.len() - 1;
        let start = hash as usize & mask;

        (0..self.slots.len()).scan(start, move |index, step| {
            let current = *index;
            *index = (*index + step + 1) & mask;
            Some(current)
        })
    }

    fn find(&self, owner: ThreadId, hash: u64) -> Option<NonNull<T>> {
        for index in self.probe(hash) {
            match &self.slots[index] {
                Some(entry) if entry.owner == owner => return Some(entry.value),
                Some(_) => continue,
                None => return None,
            }
        }
        None
    }

    /// Inserts `value` for `owner`, growing the table when it is too full
    /// to keep probe sequences short.
    fn insert(&mut self, owner: ThreadId, hash: u64, value: T) -> NonNull<T> {
        // A re-entrant factory may already have created this thread's entry.
        if let Some(existing) = self.find(owner, hash) {
            return existing;
        }

        if (self.len + 1) * 2 > self.slots.len() {
            self.grow();
        }

        let index = self
            .probe(hash)
            .find(|&index| self.slots[index].is_none())
            .expect("thread-local table has a free slot after growing");

        let entry = self.slots[index].insert(Entry::new(owner, value));
        self.len += 1;

        entry.value
    }

    fn grow(&mut self) {
        let mut grown = Self::with_slots(self.slots.len() * 2);

        for entry in self.slots.drain(..).flatten() {
            let hash = hash_thread(entry.owner);
            let index = grown
                .probe(hash)
                .find(|&index| grown.slots[index].is_none())
                .expect("grown thread-local table has a free slot");
            grown.slots[index] = Some(entry);
            grown.len += 1;
        }

        *self = grown;
    }
}

fn hash_thread(id: ThreadId) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

/// Lazily constructed per-thread instances of `T`.
///
/// [`get`](Self::get) returns the calling thread's instance, creating it
/// with the factory on first access. [`for_all`](Self::for_all) visits the
/// instances that were created, typically after a parallel loop, to merge
/// per-thread results.
///
/// Instances are only ever shared with the thread that created them, so
/// `T` need not be `Sync`; interior mutability such as `RefCell` is the
/// usual way to mutate them.
///
/// # Examples
///
/// ```rust
/// use raypool::ThreadPool;
/// use std::cell::RefCell;
///
/// let pool = ThreadPool::new(4).unwrap();
/// let mut hits = pool.thread_local(|| RefCell::new(Vec::new()));
///
/// pool.parallel_for_each(0, 100, |i| hits.get().borrow_mut().push(i));
///
/// let mut total = 0;
/// hits.for_all(|list| total += list.get_mut().len());
/// assert_eq!(total, 100);
/// ```
pub struct ThreadLocal<T> {
    table: RwLock<Table<T>>,
    create: Box<dyn Fn() -> T + Send + Sync>,
}

// Safety: the container owns its instances like a `Vec<Box<T>>` would.
unsafe impl<T: Send> Send for ThreadLocal<T> {}

// Safety: each instance is only reachable through `get` from the thread
// that created it, or through `&mut self`, so sharing the container never
// shares a `T` between threads.
unsafe impl<T: Send> Sync for ThreadLocal<T> {}

impl<T: Send> ThreadLocal<T> {
    /// Creates storage sized for one thread per available core.
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_threads(available_cores(), create)
    }

    /// Creates storage sized for `threads` participating threads.
    ///
    /// The table starts with `4 * threads` slots to keep collisions rare
    /// and grows if more threads show up.
    pub fn with_threads<F>(threads: usize, create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            table: RwLock::new(Table::with_slots(SLOTS_PER_THREAD * threads)),
            create: Box::new(create),
        }
    }

    /// Returns the calling thread's instance, creating it on first access.
    ///
    /// The factory runs without any lock held, so it may itself use other
    /// `ThreadLocal`s or dispatch work.
    pub fn get(&self) -> &T {
        let owner = thread::current().id();
        let hash = hash_thread(owner);

        let existing = self
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .find(owner, hash);

        let pointer = match existing {
            Some(pointer) => pointer,
            None => {
                let value = (self.create)();
                self.table
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(owner, hash, value)
            }
        };

        // Safety: the instance is heap allocated and entries are only
        // dropped with `&mut self`, so it outlives the returned borrow of
        // `self`. Only this thread can reach it through `get`.
        unsafe { pointer.as_ref() }
    }

    /// Calls `func` once for every instance created so far.
    ///
    /// Threads that never called [`get`](Self::get) have no instance and
    /// are not visited.
    pub fn for_all<F>(&mut self, mut func: F)
    where
        F: FnMut(&mut T),
    {
        let table = self.table.get_mut().unwrap_or_else(PoisonError::into_inner);

        for entry in table.slots.iter_mut().flatten() {
            // Safety: `&mut self` rules out any outstanding `get` borrow.
            func(unsafe { entry.value.as_mut() });
        }
    }

    /// Number of instances created so far.
    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len
    }

    /// Returns `true` if no thread has created an instance yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + Default + 'static> Default for ThreadLocal<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T: Send> fmt::Debug for ThreadLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocal")
            .field("instances", &self.len())
            .finish()
    }
}
