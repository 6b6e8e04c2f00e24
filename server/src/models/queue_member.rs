//! Realtime queue membership mirror rows. The PBX reads this table directly
//! when deciding whether to offer calls to a member.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueMember {
    pub uniqueid: i32,
    pub queue_name: String,
    /// Channel technology address, e.g. `PJSIP/1001`.
    pub interface: String,
    pub membername: Option<String>,
    pub penalty: i32,
    pub paused: bool,
    pub paused_reason: Option<String>,
}

/// Maps an extension to the channel interface used in the mirror and in
/// manager actions.
pub fn pjsip_interface(extension: &str) -> String {
    format!("PJSIP/{}", extension)
}
