//! The leader-election contract the executor consults after applying each
//! action, to detect late leadership loss before logging success.
//!
//! Grounded in `operator/universe_operator/leader_election.py`. Only the
//! contract is reproduced here — a live Lease-backed elector belongs to the
//! deployment surface (the controller framework), a named non-goal, so no
//! implementation performs lease I/O in this crate.

/// Whatever currently holds (or believes it holds) leadership for this
/// operator instance.
///
/// [`crate::executor::ExecutorLayer::apply`] calls [`LeaderElector::is_leader`]
/// immediately after each side-effecting call completes, not before — this
/// is a post-hoc fencing check, not a true fence. A lease can still expire
/// in the gap between the check and the call it's meant to guard; that
/// window is an accepted limitation, not a bug in this implementation.
pub trait LeaderElector: Send + Sync {
    /// Whether this process currently holds leadership.
    fn is_leader(&self) -> bool;
}

/// A [`LeaderElector`] that always reports leadership held, for callers
/// that run outside any multi-replica deployment (tests, single-instance
/// CLI tools).
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLeader;

impl LeaderElector for AlwaysLeader {
    fn is_leader(&self) -> bool {
        true
    }
}
