use super::ParallelJob;
use crate::utils::Slab;

use std::sync::Arc;

/// Initial number of node slots; enough for typical nesting depths.
const INITIAL_SLOTS: usize = 16;

/// A node of the job list.
struct JobNode {
    /// The published job. The list owns one reference while linked.
    job: Arc<dyn ParallelJob>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// The pool's list of published jobs.
///
/// An intrusive doubly-linked list whose nodes live in a [`Slab`] and are
/// linked by slot index. Each job records its own slot in its
/// [`JobHeader`](super::JobHeader), which makes removal O(1).
///
/// Jobs are inserted at the head and scans always start there, so the
/// most recently published job is offered work first.
///
/// The list is only ever touched while the pool mutex is held.
pub(crate) struct JobList {
    nodes: Slab<JobNode>,
    head: Option<usize>,
}

impl JobList {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Slab::new(INITIAL_SLOTS),
            head: None,
        }
    }

    /// Links `job` at the head of the list.
    ///
    /// # Panics
    ///
    /// Panics if the job is already linked.
    pub(crate) fn push_front(&mut self, job: Arc<dyn ParallelJob>) {
        assert!(job.header().is_removed(), "job published twice");

        let slot = self.nodes.insert(JobNode {
            job,
            prev: None,
            next: self.head,
        });

        if let Some(head) = self.head {
            self.nodes.get_mut(head).prev = Some(slot);
        }
        self.head = Some(slot);

        self.nodes.get(slot).job.header().set_slot(Some(slot));
    }

    /// Unlinks `job` and releases the list's reference to it.
    ///
    /// Removing a job that is not linked is a no-op.
    pub(crate) fn remove(&mut self, job: &dyn ParallelJob) {
        let Some(slot) = job.header().slot() else {
            return;
        };

        let node = self.nodes.remove(slot);

        match node.prev {
            Some(prev) => self.nodes.get_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        if let Some(next) = node.next {
            self.nodes.get_mut(next).prev = node.prev;
        }

        node.job.header().set_slot(None);
    }

    /// Returns the first job, starting from the head, that has work.
    pub(crate) fn find_work(&self) -> Option<Arc<dyn ParallelJob>> {
        let mut cursor = self.head;

        while let Some(slot) = cursor {
            let node = self.nodes.get(slot);
            if node.job.have_work() {
                return Some(node.job.clone());
            }
            cursor = node.next;
        }

        None
    }

    /// Number of linked jobs.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::JobList;
    use crate::job::{JobHeader, ParallelJob};
    use crate::pool::State;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, MutexGuard};

    struct FakeJob {
        header: JobHeader,
        work: AtomicBool,
    }

    impl FakeJob {
        fn new(work: bool) -> Arc<Self> {
            Arc::new(Self {
                header: JobHeader::new(),
                work: AtomicBool::new(work),
            })
        }
    }

    impl ParallelJob for FakeJob {
        fn header(&self) -> &JobHeader {
            &self.header
        }

        fn have_work(&self) -> bool {
            self.work.load(Ordering::Relaxed)
        }

        fn run_step(&self, _guard: MutexGuard<'_, State>) {}
    }

    fn same(a: &Arc<dyn ParallelJob>, b: &Arc<FakeJob>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
    }

    #[test]
    fn scan_starts_at_most_recent_job() {
        let mut list = JobList::new();
        let first = FakeJob::new(true);
        let second = FakeJob::new(true);

        list.push_front(first.clone());
        list.push_front(second.clone());

        let found = list.find_work().expect("work available");
        assert!(same(&found, &second));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn scan_skips_jobs_without_work() {
        let mut list = JobList::new();
        let busy = FakeJob::new(true);
        let idle = FakeJob::new(false);

        list.push_front(busy.clone());
        list.push_front(idle.clone());

        let found = list.find_work().expect("work available");
        assert!(same(&found, &busy));
    }

    #[test]
    fn remove_relinks_neighbours() {
        let mut list = JobList::new();
        let jobs: Vec<_> = (0..3).map(|_| FakeJob::new(false)).collect();
        for job in &jobs {
            list.push_front(job.clone());
        }

        list.remove(&*jobs[1]);
        assert!(jobs[1].header().is_removed());
        assert_eq!(list.len(), 2);

        // Removal is idempotent.
        list.remove(&*jobs[1]);
        assert_eq!(list.len(), 2);

        jobs[0].work.store(true, Ordering::Relaxed);
        let found = list.find_work().expect("tail still reachable");
        assert!(same(&found, &jobs[0]));
        drop(found);

        list.remove(&*jobs[2]);
        list.remove(&*jobs[0]);
        assert_eq!(list.len(), 0);
        assert_eq!(Arc::strong_count(&jobs[0]), 1);
    }
}
