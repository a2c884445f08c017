use std::any::Any;
use std::fmt;

/// A single opaque argument passed to a job's work function.
pub type JobArg = Box<dyn Any + Send>;

/// The work function carried by a [`Job`].
///
/// The function receives ownership of the argument list captured at
/// submission time and is invoked at most once, by exactly one worker.
pub type WorkFn = Box<dyn FnOnce(Vec<JobArg>) + Send>;

/// A unit of deferred work: a work function plus the arguments captured when
/// the job was created.
///
/// A `Job` is immutable once submitted. It is owned by the pool's job queue
/// until claimed by a worker, then by that worker for the duration of
/// execution, then dropped.
pub struct Job {
    work: Option<WorkFn>,
    args: Vec<JobArg>,
}

impl Job {
    /// Creates a job from a work function and its argument list.
    pub fn new(work: impl FnOnce(Vec<JobArg>) + Send + 'static, args: Vec<JobArg>) -> Self {
        Self {
            work: Some(Box::new(work)),
            args,
        }
    }

    /// Creates a job with no work function.
    ///
    /// Such a job is accepted by the queue but reported as a configuration
    /// error and skipped when a worker picks it up.
    pub fn without_work(args: Vec<JobArg>) -> Self {
        Self { work: None, args }
    }

    /// Number of captured arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Whether the job carries a work function.
    pub fn has_work(&self) -> bool {
        self.work.is_some()
    }

    pub(crate) fn into_parts(self) -> (Option<WorkFn>, Vec<JobArg>) {
        (self.work, self.args)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("has_work", &self.work.is_some())
            .field("arg_count", &self.args.len())
            .finish()
    }
}
