use serde::Serialize;
use utoipa::ToSchema;

/// Members who currently have bock, in store order.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMembersResponse {
    /// Ids of the active members.
    pub active_user_ids: Vec<String>,
}
