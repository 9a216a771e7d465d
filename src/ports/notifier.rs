//! Chat delivery outbound port. Push finished reports to an external chat room.

use crate::domain::{DomainError, Report};

/// Port for posting a report to a chat room.
///
/// Implemented by adapters (e.g. Chatwork). Failures are logged by the caller and
/// never undo the persisted report.
#[async_trait::async_trait]
pub trait ChatDeliveryPort: Send + Sync {
    /// Format and send one message for `report`.
    ///
    /// # Arguments
    /// * `room_id` - Target room
    /// * `api_token` - Per-schedule token of the chat account posting the message
    /// * `report` - The persisted report
    /// * `account_name` - Display name of the ad account, used in the header
    ///
    /// # Errors
    /// Returns `DomainError::Delivery` if the API call fails.
    async fn deliver_report(
        &self,
        room_id: &str,
        api_token: &str,
        report: &Report,
        account_name: &str,
    ) -> Result<(), DomainError>;
}
