use crate::error::{AppError, AppResult};
use crate::runninghub::client::RunningHubClient;
use crate::runninghub::types::AccountStatus;

/// Refuses new work while the account already runs `limit` tasks.
pub struct AccountGate<'a> {
    client: &'a RunningHubClient,
    limit: u32,
}

impl<'a> AccountGate<'a> {
    pub fn new(client: &'a RunningHubClient, limit: u32) -> Self {
        AccountGate { client, limit }
    }

    /// Fetch a fresh account snapshot and check it against the ceiling.
    /// A failed status query is returned as-is; capacity is never assumed.
    pub async fn check(&self) -> AppResult<AccountStatus> {
        let status = self.client.account_status().await?;
        if status.current_task_counts >= self.limit {
            tracing::warn!(
                "Refusing submission: {} tasks running (limit {})",
                status.current_task_counts,
                self.limit
            );
            return Err(AppError::QuotaExceeded { current: status.current_task_counts, limit: self.limit });
        }
        Ok(status)
    }
}
