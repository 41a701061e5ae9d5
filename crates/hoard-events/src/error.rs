/// Errors seen by an event subscriber.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The subscriber fell behind and the oldest events were dropped.
    #[error("subscriber lagged behind, {0} events skipped")]
    Lagged(u64),

    /// The bus was dropped or the subscription was cancelled.
    #[error("event bus closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, EventError>;
