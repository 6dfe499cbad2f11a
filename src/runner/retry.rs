//! Retry policy for timed-out batches

use serde::{Deserialize, Serialize};

/// Decides whether a timed-out batch is attempted again.
///
/// With no ceiling the batch is retried until it succeeds or the operator
/// interrupts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    pub fn limited(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// Whether another attempt may follow `attempts_made` failed ones
    pub fn permits(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }

    pub fn describe(&self) -> String {
        match self.max_attempts {
            Some(max) => format!("at most {} attempt(s) per batch", max),
            None => "unbounded".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_always_permits() {
        let policy = RetryPolicy::default();
        assert_eq!(policy, RetryPolicy::unbounded());
        assert!(policy.permits(1));
        assert!(policy.permits(10_000));
        assert_eq!(policy.describe(), "unbounded");
    }

    #[test]
    fn test_limited_policy() {
        let policy = RetryPolicy::limited(3);
        assert!(policy.permits(1));
        assert!(policy.permits(2));
        assert!(!policy.permits(3));
    }

    #[test]
    fn test_limited_floor_is_one() {
        let policy = RetryPolicy::limited(0);
        assert_eq!(policy.max_attempts, Some(1));
        assert!(!policy.permits(1));
    }
}
