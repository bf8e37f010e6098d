use crate::access::AccessError;
use crate::aggregate::AggregateError;
use crate::batch::BatchError;
use crate::identity::Identity;
use crate::oracle::{OracleError, RequestId};
use crate::rate_limit::RateLimitError;

/// How a failure should be handled by whoever sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller lacks the required role. Never retried automatically.
    Authorization,
    /// Lifecycle state forbids the action right now; retry once it changes.
    Availability,
    /// Cooldown in effect; retry after the window elapses.
    Rate,
    /// Protocol violation. Never retried with the same request.
    Integrity,
    /// A collaborator (engine, store, oracle transport) failed.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("{caller} is not the designated oracle caller")]
    NotOracle { caller: Identity },
    #[error("unknown decryption request {0}")]
    UnknownRequest(RequestId),
    #[error("decryption request {0} was already processed")]
    Replay(RequestId),
    #[error("encrypted state changed since decryption request {0} was issued")]
    StateMismatch(RequestId),
    #[error("invalid decryption proof for request {0}")]
    InvalidProof(RequestId),
    #[error("cleartext for request {request_id} is malformed ({len} bytes)")]
    MalformedCleartext { request_id: RequestId, len: usize },
    #[error("decryption request {0} expired before its result arrived")]
    RequestExpired(RequestId),
    #[error("encrypted input not initialized: {0}")]
    NotInitialized(String),
    #[error("too many pending decryption requests (limit {limit})")]
    TooManyPendingRequests { limit: usize },
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("aggregate error: {0}")]
    Aggregate(AggregateError),
}

impl From<AggregateError> for PipelineError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::NotInitialized(reason) => PipelineError::NotInitialized(reason),
            other => PipelineError::Aggregate(other),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Access(AccessError::Paused) => ErrorKind::Availability,
            PipelineError::Access(_) | PipelineError::NotOracle { .. } => ErrorKind::Authorization,
            PipelineError::Batch(_) | PipelineError::TooManyPendingRequests { .. } => {
                ErrorKind::Availability
            }
            PipelineError::RateLimit(_) => ErrorKind::Rate,
            PipelineError::UnknownRequest(_)
            | PipelineError::Replay(_)
            | PipelineError::StateMismatch(_)
            | PipelineError::InvalidProof(_)
            | PipelineError::MalformedCleartext { .. }
            | PipelineError::RequestExpired(_)
            | PipelineError::NotInitialized(_) => ErrorKind::Integrity,
            PipelineError::Oracle(_) | PipelineError::Aggregate(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed later without anything else changing
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Availability | ErrorKind::Rate)
    }

    /// Failures that point at a misbehaving or misconfigured oracle and
    /// should reach an operator
    pub fn is_oracle_fault(&self) -> bool {
        matches!(
            self,
            PipelineError::Replay(_)
                | PipelineError::InvalidProof(_)
                | PipelineError::MalformedCleartext { .. }
                | PipelineError::NotOracle { .. }
                | PipelineError::Oracle(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::ActionClass;

    #[test]
    fn test_taxonomy() {
        let caller = Identity::from([3u8; 32]);

        assert_eq!(
            PipelineError::from(AccessError::NotOwner { caller }).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            PipelineError::from(AccessError::Paused).kind(),
            ErrorKind::Availability
        );
        assert_eq!(
            PipelineError::from(BatchError::BatchClosed { batch_id: 0 }).kind(),
            ErrorKind::Availability
        );

        let cooldown = PipelineError::from(RateLimitError::CooldownActive {
            actor: caller,
            class: ActionClass::Submission,
            remaining_secs: 5,
        });
        assert_eq!(cooldown.kind(), ErrorKind::Rate);
        assert!(cooldown.is_retryable());

        let mismatch = PipelineError::StateMismatch(RequestId(1));
        assert_eq!(mismatch.kind(), ErrorKind::Integrity);
        assert!(!mismatch.is_retryable());
        assert!(!mismatch.is_oracle_fault());
        assert!(PipelineError::Replay(RequestId(1)).is_oracle_fault());
    }

    #[test]
    fn test_not_initialized_is_lifted_out_of_aggregate_errors() {
        let err = PipelineError::from(AggregateError::NotInitialized("empty".to_string()));
        assert!(matches!(err, PipelineError::NotInitialized(_)));

        let err = PipelineError::from(AggregateError::Default(anyhow::anyhow!("boom")));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
