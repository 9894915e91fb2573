//! Ready queue - intrusive FIFO of jobs at one priority level of one CPU
//!
//! Jobs carry their own link, so queueing never allocates. Every queue
//! knows its [`QueueTag`] and stamps it into the jobs it links; removal
//! checks the stamp first, which turns removing a job that is not in this
//! queue into a no-op and keeps the unsafe cursor lookup honest.
//!
//! Tags carry the identity of the owning scheduler, drawn once from a
//! global counter, so no two live queues share a tag even when two
//! schedulers claim the same CPU.

use intrusive_collections::LinkedList;

use crate::processor::CpuId;
use crate::scheduler::job::{Job, Priority, ReadyAdapter};

/// Identity of one ready queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTag {
    pub cpu: CpuId,
    pub priority: Priority,
    /// Identity of the owning scheduler
    pub(crate) owner: u64,
}

pub struct ReadyQueue<'a> {
    tag: QueueTag,
    list: LinkedList<ReadyAdapter<'a>>,
}

impl<'a> ReadyQueue<'a> {
    pub(crate) fn new(tag: QueueTag) -> Self {
        Self {
            tag,
            list: LinkedList::new(ReadyAdapter::new()),
        }
    }

    pub fn tag(&self) -> QueueTag {
        self.tag
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Number of queued jobs, O(n)
    pub fn len(&self) -> usize {
        self.list.iter().count()
    }

    /// Whether `job` is linked into this queue
    pub fn contains(&self, job: &Job<'a>) -> bool {
        job.queue_tag() == Some(self.tag)
    }

    pub fn head(&self) -> Option<&'a Job<'a>> {
        self.list.front().clone_pointer()
    }

    /// Append `job`, which must not be queued anywhere
    pub fn insert_tail(&mut self, job: &'a Job<'a>) {
        crate::sched_assert!(!job.is_linked(), "job '{}' queued twice", job.label());
        job.set_queue_tag(Some(self.tag));
        self.list.push_back(job);
    }

    /// Prepend `job`, which must not be queued anywhere
    pub fn insert_head(&mut self, job: &'a Job<'a>) {
        crate::sched_assert!(!job.is_linked(), "job '{}' queued twice", job.label());
        job.set_queue_tag(Some(self.tag));
        self.list.push_front(job);
    }

    /// Unlink `job`; returns false if it was not in this queue
    pub fn remove(&mut self, job: &Job<'a>) -> bool {
        if !self.contains(job) {
            return false;
        }
        // SAFETY: the tag is set exactly while the job is linked into the
        // queue that stamped it. Tags are unique: the owner id differs
        // between schedulers and the priority between queues of one
        // scheduler, and only `Scheduler::new` builds queues.
        let mut cursor = unsafe { self.list.cursor_mut_from_ptr(job) };
        let _ = cursor.remove();
        job.set_queue_tag(None);
        true
    }

    /// Move `job` behind every other job of this queue
    pub fn move_to_tail(&mut self, job: &'a Job<'a>) {
        if self.remove(job) {
            self.insert_tail(job);
        }
    }

    /// Visit the queued jobs from head to tail
    pub fn for_each(&self, mut f: impl FnMut(&'a Job<'a>)) {
        let mut cursor = self.list.front();
        while let Some(job) = cursor.clone_pointer() {
            f(job);
            cursor.move_next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr;

    fn tag() -> QueueTag {
        QueueTag {
            cpu: CpuId::PRIMARY,
            priority: Priority::MIN,
            owner: 0,
        }
    }

    fn labels<'a>(queue: &ReadyQueue<'a>) -> std::vec::Vec<&'static str> {
        let mut out = std::vec::Vec::new();
        queue.for_each(|job| out.push(job.label()));
        out
    }

    #[test]
    fn test_insert_order() {
        let a = Job::thread("a", Priority::MIN, 1);
        let b = Job::thread("b", Priority::MIN, 1);
        let c = Job::thread("c", Priority::MIN, 1);
        let mut queue = ReadyQueue::new(tag());

        assert!(queue.head().is_none());
        queue.insert_tail(&a);
        queue.insert_tail(&b);
        queue.insert_head(&c);

        assert_eq!(labels(&queue), ["c", "a", "b"]);
        assert!(ptr::eq(queue.head().unwrap(), &c));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let a = Job::thread("a", Priority::MIN, 1);
        let b = Job::thread("b", Priority::MIN, 1);
        let mut queue = ReadyQueue::new(tag());
        queue.insert_tail(&a);
        queue.insert_tail(&b);

        assert!(queue.remove(&a));
        assert!(!queue.remove(&a));
        assert!(!queue.contains(&a));
        assert!(!a.is_queued());
        assert_eq!(labels(&queue), ["b"]);
    }

    #[test]
    fn test_remove_from_foreign_queue_is_noop() {
        let a = Job::thread("a", Priority::MIN, 1);
        let mut mine = ReadyQueue::new(tag());
        let mut other = ReadyQueue::new(QueueTag {
            cpu: CpuId::new(1),
            priority: Priority::MIN,
            owner: 1,
        });
        mine.insert_tail(&a);

        assert!(!other.remove(&a));
        assert!(mine.contains(&a));
        assert!(other.is_empty());
    }

    #[test]
    fn test_same_cpu_other_owner_is_foreign() {
        let a = Job::thread("a", Priority::MIN, 1);
        let x = Job::thread("x", Priority::MIN, 1);
        let mut mine = ReadyQueue::new(tag());
        let mut twin = ReadyQueue::new(QueueTag { owner: 1, ..tag() });
        mine.insert_tail(&a);
        twin.insert_tail(&x);

        assert!(!twin.remove(&a));
        assert!(mine.contains(&a));
        assert_eq!(labels(&mine), ["a"]);
        assert_eq!(labels(&twin), ["x"]);
    }

    #[test]
    fn test_move_to_tail() {
        let a = Job::thread("a", Priority::MIN, 1);
        let b = Job::thread("b", Priority::MIN, 1);
        let c = Job::thread("c", Priority::MIN, 1);
        let mut queue = ReadyQueue::new(tag());
        queue.insert_tail(&a);
        queue.insert_tail(&b);
        queue.insert_tail(&c);

        queue.move_to_tail(&a);
        assert_eq!(labels(&queue), ["b", "c", "a"]);
        queue.move_to_tail(&c);
        assert_eq!(labels(&queue), ["b", "a", "c"]);
    }
}
