//! Cooperative single-threaded scheduler with a virtual clock.
//!
//! The engine never blocks: state mutations enqueue render jobs, deferred
//! hydration strategies enqueue timers. The engine drains the job queue one
//! tick at a time; timers move into the queue when the clock is advanced past
//! their deadline.

use crate::component::NodeId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

/// Work item processed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Job {
	/// Re-render the subtree rooted at the node.
	Render(NodeId),
	/// Hydrate the node.
	Hydrate(NodeId),
}

impl Job {
	pub fn node(&self) -> &NodeId {
		match self {
			Self::Render(id) | Self::Hydrate(id) => id,
		}
	}
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Timer {
	deadline: Duration,
	// Ties fire in scheduling order.
	seq: u64,
	job: JobKey,
}

// `Job` carries no ordering; timers order by (deadline, seq) only.
#[derive(Debug, PartialEq, Eq)]
struct JobKey(Job);

impl PartialOrd for JobKey {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for JobKey {
	fn cmp(&self, _other: &Self) -> std::cmp::Ordering {
		std::cmp::Ordering::Equal
	}
}

/// Job queue plus timer queue.
#[derive(Debug, Default)]
pub struct Scheduler {
	now: Duration,
	seq: u64,
	queue: VecDeque<Job>,
	timers: BinaryHeap<Reverse<Timer>>,
}

impl Scheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Current virtual time.
	pub fn now(&self) -> Duration {
		self.now
	}

	/// Appends a job for the next tick. Duplicate pending jobs are dropped.
	pub fn enqueue(&mut self, job: Job) {
		if !self.queue.contains(&job) {
			self.queue.push_back(job);
		}
	}

	/// Enqueues `job` once the clock reaches `now + delay`.
	pub fn schedule_after(&mut self, delay: Duration, job: Job) {
		self.seq += 1;
		self.timers.push(Reverse(Timer {
			deadline: self.now + delay,
			seq: self.seq,
			job: JobKey(job),
		}));
	}

	/// Advances the clock by `by`, moving every due timer into the job queue.
	pub fn advance(&mut self, by: Duration) {
		self.now += by;
		while let Some(Reverse(timer)) = self.timers.peek() {
			if timer.deadline > self.now {
				break;
			}
			if let Some(Reverse(timer)) = self.timers.pop() {
				self.enqueue(timer.job.0);
			}
		}
	}

	/// Deadline of the earliest pending timer.
	pub fn next_deadline(&self) -> Option<Duration> {
		self.timers.peek().map(|Reverse(timer)| timer.deadline)
	}

	/// Takes every job queued so far. Jobs enqueued while these run belong
	/// to the next tick.
	pub fn drain(&mut self) -> Vec<Job> {
		self.queue.drain(..).collect()
	}

	/// Drops queued jobs and pending timers that target `id`.
	pub fn cancel(&mut self, id: &NodeId) {
		self.queue.retain(|job| job.node() != id);
		self.timers.retain(|Reverse(timer)| timer.job.0.node() != id);
	}

	pub fn has_queued(&self) -> bool {
		!self.queue.is_empty()
	}

	pub fn pending_timers(&self) -> usize {
		self.timers.len()
	}

	/// No queued jobs and no pending timers.
	pub fn is_idle(&self) -> bool {
		self.queue.is_empty() && self.timers.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn render(id: &str) -> Job {
		Job::Render(NodeId::from(id))
	}

	fn hydrate(id: &str) -> Job {
		Job::Hydrate(NodeId::from(id))
	}

	#[rstest]
	fn test_enqueue_dedups_pending_jobs() {
		let mut scheduler = Scheduler::new();
		scheduler.enqueue(render("a"));
		scheduler.enqueue(render("a"));
		scheduler.enqueue(hydrate("a"));

		assert_eq!(scheduler.drain(), vec![render("a"), hydrate("a")]);
		assert!(scheduler.is_idle());
	}

	#[rstest]
	fn test_timers_fire_in_deadline_order() {
		let mut scheduler = Scheduler::new();
		scheduler.schedule_after(Duration::from_millis(300), hydrate("late"));
		scheduler.schedule_after(Duration::from_millis(100), hydrate("early"));
		scheduler.schedule_after(Duration::from_millis(100), hydrate("early-2"));

		scheduler.advance(Duration::from_millis(99));
		assert!(!scheduler.has_queued());
		assert_eq!(scheduler.next_deadline(), Some(Duration::from_millis(100)));

		scheduler.advance(Duration::from_millis(1));
		assert_eq!(scheduler.drain(), vec![hydrate("early"), hydrate("early-2")]);

		scheduler.advance(Duration::from_millis(500));
		assert_eq!(scheduler.drain(), vec![hydrate("late")]);
		assert_eq!(scheduler.now(), Duration::from_millis(600));
	}

	#[rstest]
	fn test_cancel_drops_jobs_and_timers() {
		let mut scheduler = Scheduler::new();
		scheduler.enqueue(render("a"));
		scheduler.enqueue(render("b"));
		scheduler.schedule_after(Duration::from_secs(1), hydrate("a"));

		scheduler.cancel(&NodeId::from("a"));
		scheduler.advance(Duration::from_secs(2));

		assert_eq!(scheduler.drain(), vec![render("b")]);
		assert_eq!(scheduler.pending_timers(), 0);
	}
}
