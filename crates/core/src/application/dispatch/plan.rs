// Dispatch plans - what each console command puts on the queue

use crate::domain::ProbeTask;

/// One unit handed to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Independent job, no ordering relative to anything else
    Single(ProbeTask),
    /// Ordered batch; each member waits for its predecessor to finish
    Chain(Vec<ProbeTask>),
}

impl Submission {
    pub fn task_count(&self) -> usize {
        match self {
            Submission::Single(_) => 1,
            Submission::Chain(tasks) => tasks.len(),
        }
    }
}

/// Ordered sequence of submissions.
///
/// Counts are signed so that whatever the caller parsed can be passed through;
/// non-positive counts contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    submissions: Vec<Submission>,
}

fn repeat(task: ProbeTask, count: i64) -> impl Iterator<Item = ProbeTask> {
    std::iter::repeat(task).take(count.max(0) as usize)
}

impl DispatchPlan {
    /// `count_reads` independent read-expect-read probes
    pub fn reads(count_reads: i64) -> Self {
        Self::independent(repeat(ProbeTask::read_expect_read(), count_reads))
    }

    /// Reads, then writes, then reads again; all independent
    pub fn read_write_read(count_reads: i64, count_writes: i64) -> Self {
        Self::independent(
            repeat(ProbeTask::read_expect_read(), count_reads)
                .chain(repeat(ProbeTask::write_expect_write(), count_writes))
                .chain(repeat(ProbeTask::read_expect_read(), count_reads)),
        )
    }

    /// `count_repeats` chains of reads, writes, then reads expecting the write
    /// connection. Empty chains are skipped.
    pub fn read_write_read_chain(count_repeats: i64, count_reads: i64, count_writes: i64) -> Self {
        let submissions = (0..count_repeats.max(0))
            .map(|_| {
                repeat(ProbeTask::read_expect_read(), count_reads)
                    .chain(repeat(ProbeTask::write_expect_write(), count_writes))
                    .chain(repeat(ProbeTask::read_expect_write(), count_reads))
                    .collect::<Vec<_>>()
            })
            .filter(|chain| !chain.is_empty())
            .map(Submission::Chain)
            .collect();
        Self { submissions }
    }

    /// `count_writes` independent write-expect-write probes
    pub fn writes(count_writes: i64) -> Self {
        Self::independent(repeat(ProbeTask::write_expect_write(), count_writes))
    }

    fn independent(tasks: impl Iterator<Item = ProbeTask>) -> Self {
        Self {
            submissions: tasks.map(Submission::Single).collect(),
        }
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Total number of probe tasks across all submissions
    pub fn task_count(&self) -> usize {
        self.submissions.iter().map(Submission::task_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads() {
        let plan = DispatchPlan::reads(3);
        assert_eq!(plan.task_count(), 3);
        assert!(plan
            .submissions()
            .iter()
            .all(|s| *s == Submission::Single(ProbeTask::read_expect_read())));
    }

    #[test]
    fn test_read_write_read_order() {
        let plan = DispatchPlan::read_write_read(2, 1);
        let tasks: Vec<ProbeTask> = plan
            .submissions()
            .iter()
            .map(|s| match s {
                Submission::Single(t) => *t,
                Submission::Chain(_) => panic!("expected independent submissions"),
            })
            .collect();

        assert_eq!(
            tasks,
            vec![
                ProbeTask::read_expect_read(),
                ProbeTask::read_expect_read(),
                ProbeTask::write_expect_write(),
                ProbeTask::read_expect_read(),
                ProbeTask::read_expect_read(),
            ]
        );
    }

    #[test]
    fn test_chain_shape() {
        let plan = DispatchPlan::read_write_read_chain(3, 2, 1);
        assert_eq!(plan.submissions().len(), 3);
        assert_eq!(plan.task_count(), 3 * (2 * 2 + 1));

        for submission in plan.submissions() {
            assert_eq!(
                *submission,
                Submission::Chain(vec![
                    ProbeTask::read_expect_read(),
                    ProbeTask::read_expect_read(),
                    ProbeTask::write_expect_write(),
                    ProbeTask::read_expect_write(),
                    ProbeTask::read_expect_write(),
                ])
            );
        }
    }

    #[test]
    fn test_non_positive_counts_are_noops() {
        assert!(DispatchPlan::reads(0).is_empty());
        assert!(DispatchPlan::reads(-4).is_empty());
        assert!(DispatchPlan::writes(0).is_empty());
        assert!(DispatchPlan::read_write_read(0, 0).is_empty());
        assert!(DispatchPlan::read_write_read_chain(0, 5, 5).is_empty());
        assert!(DispatchPlan::read_write_read_chain(-1, 5, 5).is_empty());
        // Repeats but nothing inside each chain
        assert!(DispatchPlan::read_write_read_chain(3, 0, 0).is_empty());
    }

    #[test]
    fn test_chain_with_only_writes() {
        let plan = DispatchPlan::read_write_read_chain(1, 0, 2);
        assert_eq!(
            plan.submissions(),
            &[Submission::Chain(vec![
                ProbeTask::write_expect_write(),
                ProbeTask::write_expect_write(),
            ])]
        );
    }
}
