use thiserror::Error;

/// The simulator's result type.
pub type SkeletonResult<T> = Result<T, SkeletonError>;

/// An error produced while computing a straight skeleton.
///
/// The simulator is fail-fast: invariant violations and impossible
/// configurations abort the run and the partially built skeleton is
/// discarded.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum SkeletonError {
    /// The input cannot be skeletonized: open PSLG, duplicate points,
    /// crossing segments, fewer than three points.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// A structural invariant of the kinetic triangulation no longer holds.
    #[error("invariant violation at t={time}: {message}")]
    InvariantViolation { message: &'static str, time: f64 },

    /// A case analysis branch reached a state that the invariants rule out,
    /// e.g. a two-wavefront triangle with exactly two zero length sides.
    #[error("impossible configuration in triangle [{triangle}] at t={time}: {message}")]
    ImpossibleConfiguration {
        message: &'static str,
        triangle: u32,
        time: f64,
    },

    /// The event loop guard fired; the simulation did not make progress.
    #[error("event loop stopped after {steps} events")]
    NumericStall { steps: u32 },
}
