/// Failures raised by the planning core. Both variants are input defects;
/// the computation itself is deterministic and never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsolvable target: {0}")]
    UnsolvableTarget(String),
}
