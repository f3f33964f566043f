use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// A position size of zero is NOT represented here: it is the normal
/// "do not trade" contract of the risk manager. Likewise circuit-breaker
/// activation is a controlled operating state, not an error.
#[derive(Debug, Error)]
pub enum BotError {
    /// Fatal. Raised during startup validation, before any trading logic runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Balance/capital fetch failed. Callers recover with a conservative
    /// default and keep running.
    #[error("provider error: {0}")]
    Provider(String),

    /// Order submit/cancel failed. The order is marked Error, no position is
    /// opened and there is no automatic retry.
    #[error("execution error: {0}")]
    Execution(String),

    /// Orphan order discovered at startup. Surfaced to the operator, never
    /// auto-resolved.
    #[error("reconciliation warning: {0}")]
    Reconciliation(String),

    #[error("insufficient data: have {have} candles, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("position error: {0}")]
    Position(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
