//! Store call deadlines

use std::future::Future;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Run a store call with a deadline
///
/// Elapsed deadlines become `AuthError::StoreTimeout(operation)`.
pub(crate) async fn within<T, F>(limit: Duration, operation: &'static str, call: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(AuthError::StoreTimeout(operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let out = within(Duration::from_secs(1), "op", async { Ok::<_, AuthError>(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_times_out() {
        let out = within(Duration::from_millis(50), "slow_op", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AuthError>(())
        })
        .await;
        assert!(matches!(out, Err(AuthError::StoreTimeout("slow_op"))));
    }
}
