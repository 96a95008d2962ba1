use store::Transaction;

use crate::error::OrderError;

/// Ends a transaction according to the outcome of the work done inside it:
/// commits on success, rolls back on any error.
pub(crate) async fn finish<T, Tx>(tx: Tx, outcome: Result<T, OrderError>) -> Result<T, OrderError>
where
    Tx: Transaction,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                // The handle is consumed either way, which discards its changes.
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
