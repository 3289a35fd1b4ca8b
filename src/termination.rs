use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// When a scenario sweep should stop taking samples
#[derive(Clone, Debug)]
pub enum Termination {
    /// Terminate after the given number of samples
    Samples(u64),
    /// Maximum running time from `Instant`
    Timeout(Instant, Duration),
    /// Terminate once the flag is raised, e.g. from a signal handler
    Interrupt(Arc<AtomicBool>),
    /// Run until the range is exhausted
    Never,
    /// Terminate if either of the two termination criteria
    /// tells it to terminate
    Any(Box<Termination>, Box<Termination>),
    /// Terminate when both of the criteria tells it to terminate
    All(Box<Termination>, Box<Termination>),
}

impl Termination {
    /// A timeout starting now
    pub fn timeout(duration: Duration) -> Termination {
        Termination::Timeout(Instant::now(), duration)
    }

    /// Whether to stop after `samples` samples have been taken
    pub fn should_terminate(&self, samples: u64) -> bool {
        match self {
            Termination::Samples(n) => samples >= *n,
            Termination::Timeout(from, duration) => from.elapsed() > *duration,
            Termination::Interrupt(flag) => flag.load(Ordering::Relaxed),
            Termination::Never => false,
            Termination::Any(one, two) => {
                one.should_terminate(samples) || two.should_terminate(samples)
            }
            Termination::All(one, two) => {
                one.should_terminate(samples) && two.should_terminate(samples)
            }
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Termination::Never
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Samples(n) => write!(f, "{n} samples"),
            Termination::Timeout(_, dur) => write!(f, "{} timeout", dur.as_secs()),
            Termination::Interrupt(_) => write!(f, "interrupt"),
            Termination::Never => write!(f, "never"),
            Termination::Any(lhs, rhs) => write!(f, "({lhs}) | ({rhs})"),
            Termination::All(lhs, rhs) => write!(f, "({lhs}) & ({rhs})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinators() {
        let flag = Arc::new(AtomicBool::new(false));
        let any = Termination::Any(
            Box::new(Termination::Samples(3)),
            Box::new(Termination::Interrupt(flag.clone())),
        );
        assert!(!any.should_terminate(2));
        assert!(any.should_terminate(3));

        flag.store(true, Ordering::Relaxed);
        assert!(any.should_terminate(0));

        let all = Termination::All(
            Box::new(Termination::Samples(3)),
            Box::new(Termination::Never),
        );
        assert!(!all.should_terminate(100));

        let timeout = Termination::timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(timeout.should_terminate(0));
    }
}
