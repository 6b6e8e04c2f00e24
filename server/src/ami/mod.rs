//! Asterisk Manager Interface (AMI) integration.
//!
//! The coordinator only ever needs two actions: `QueuePause` to flip a
//! member's pause flag, and `Command` to reload queue state from the realtime
//! tables. Both are modeled here; [`client::ManagerClient`] speaks the actual
//! manager protocol.

pub mod client;

pub use client::ManagerClient;

use async_trait::async_trait;
use std::fmt::Write as _;
use thiserror::Error;

/// Actions this service sends to the PBX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmiAction {
    QueuePause {
        queue: String,
        interface: String,
        paused: bool,
        /// Human-readable label shown in queue statistics; only sent when
        /// pausing.
        reason: Option<String>,
    },
    Command {
        command: String,
    },
}

impl AmiAction {
    pub fn name(&self) -> &'static str {
        match self {
            AmiAction::QueuePause { .. } => "QueuePause",
            AmiAction::Command { .. } => "Command",
        }
    }

    /// Serializes the action into manager-protocol key/value lines, including
    /// the terminating blank line.
    pub fn to_wire(&self, action_id: &str) -> String {
        let mut wire = String::new();
        let _ = write!(wire, "Action: {}\r\nActionID: {}\r\n", self.name(), action_id);
        match self {
            AmiAction::QueuePause {
                queue,
                interface,
                paused,
                reason,
            } => {
                let _ = write!(
                    wire,
                    "Queue: {}\r\nInterface: {}\r\nPaused: {}\r\n",
                    queue,
                    interface,
                    if *paused { "1" } else { "0" }
                );
                if let Some(reason) = reason {
                    let _ = write!(wire, "Reason: {}\r\n", reason);
                }
            }
            AmiAction::Command { command } => {
                let _ = write!(wire, "Command: {}\r\n", command);
            }
        }
        wire.push_str("\r\n");
        wire
    }
}

#[derive(Debug, Error)]
pub enum AmiError {
    /// No manager endpoint is configured or the session is down.
    #[error("AMI not connected")]
    NotConnected,
    #[error("AMI authentication rejected: {0}")]
    AuthRejected(String),
    /// The PBX answered with `Response: Error`.
    #[error("AMI action failed: {0}")]
    ActionFailed(String),
    #[error("AMI response timed out")]
    Timeout,
    #[error("AMI I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed manager response for a single action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmiResponse {
    /// Value of the `Response` header, e.g. `Success`.
    pub response: String,
    /// Value of the `Message` header, if any.
    pub message: Option<String>,
}

impl AmiResponse {
    /// `Command` output arrives as `Response: Follows`; that is a success.
    pub fn is_success(&self) -> bool {
        self.response.eq_ignore_ascii_case("Success") || self.response.eq_ignore_ascii_case("Follows")
    }
}

/// Seam over the manager session so the coordinator can be exercised against
/// a scripted PBX in tests. Use `MockAmiClient` to script responses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AmiClient: Send + Sync {
    /// Sends one action and waits for its response. Returns
    /// [`AmiError::ActionFailed`] when the PBX rejects the action and
    /// [`AmiError::NotConnected`] when no manager session is available.
    async fn execute_action(&self, action: AmiAction) -> Result<AmiResponse, AmiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_pause_wire_format_matches_the_manager_protocol() {
        let action = AmiAction::QueuePause {
            queue: "support".to_string(),
            interface: "PJSIP/1001".to_string(),
            paused: true,
            reason: Some("Short Break".to_string()),
        };
        let wire = action.to_wire("queuedesk-7");
        assert_eq!(
            wire,
            "Action: QueuePause\r\nActionID: queuedesk-7\r\nQueue: support\r\n\
             Interface: PJSIP/1001\r\nPaused: 1\r\nReason: Short Break\r\n\r\n"
        );
    }

    #[test]
    fn unpause_sends_zero_and_no_reason() {
        let action = AmiAction::QueuePause {
            queue: "support".to_string(),
            interface: "PJSIP/1001".to_string(),
            paused: false,
            reason: None,
        };
        let wire = action.to_wire("queuedesk-8");
        assert!(wire.contains("Paused: 0\r\n"));
        assert!(!wire.contains("Reason:"));
    }

    #[test]
    fn command_wire_format_carries_the_command_line() {
        let action = AmiAction::Command {
            command: "queue reload all".to_string(),
        };
        let wire = action.to_wire("queuedesk-9");
        assert!(wire.starts_with("Action: Command\r\n"));
        assert!(wire.contains("Command: queue reload all\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn follows_responses_count_as_success() {
        let response = AmiResponse {
            response: "Follows".to_string(),
            message: None,
        };
        assert!(response.is_success());

        let response = AmiResponse {
            response: "Error".to_string(),
            message: Some("No such queue".to_string()),
        };
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn mock_ami_client_scripts_a_response() {
        let mut mock = MockAmiClient::new();
        mock.expect_execute_action()
            .withf(|action| action.name() == "Command")
            .returning(|_| {
                Ok(AmiResponse {
                    response: "Success".to_string(),
                    message: None,
                })
            });

        let response = mock
            .execute_action(AmiAction::Command {
                command: "queue reload all".to_string(),
            })
            .await
            .unwrap();
        assert!(response.is_success());
    }
}
