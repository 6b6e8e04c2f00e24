//! Minimal manager-protocol client.
//!
//! One TCP session, one action in flight at a time. The session is opened
//! lazily on the first action and reopened after any I/O failure, so a PBX
//! restart costs one failed action rather than a stuck service.

use crate::ami::{AmiAction, AmiClient, AmiError, AmiResponse};
use crate::config::AmiConfig;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ManagerClient {
    config: Option<AmiConfig>,
    conn: Mutex<Option<ManagerConnection>>,
}

struct ManagerConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl ManagerConnection {
    fn next_action_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("queuedesk-{}", id)
    }
}

impl ManagerClient {
    /// Builds a client. With no configuration every action fails with
    /// [`AmiError::NotConnected`]; the rest of the service keeps working.
    pub fn new(config: Option<AmiConfig>) -> Self {
        if config.is_none() {
            tracing::info!("AMI host not set, PBX signalling disabled");
        }
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    async fn connect(config: &AmiConfig) -> Result<ManagerConnection, AmiError> {
        let stream = tokio::time::timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| AmiError::Timeout)??;
        let (read_half, write_half) = stream.into_split();
        let mut conn = ManagerConnection {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_id: 1,
        };

        // The server greets with a banner line before speaking the protocol.
        let mut banner = String::new();
        conn.reader.read_line(&mut banner).await.map_err(AmiError::Io)?;
        tracing::debug!(banner = banner.trim(), "Connected to manager interface");

        let action_id = conn.next_action_id();
        let login = format!(
            "Action: Login\r\nActionID: {}\r\nUsername: {}\r\nSecret: {}\r\nEvents: off\r\n\r\n",
            action_id, config.username, config.secret
        );
        let response = tokio::time::timeout(
            RESPONSE_TIMEOUT,
            round_trip(&mut conn, &login, &action_id),
        )
        .await
        .map_err(|_| AmiError::Timeout)??;
        if !response.is_success() {
            return Err(AmiError::AuthRejected(
                response
                    .message
                    .unwrap_or_else(|| "authentication failed".to_string()),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, "Manager login succeeded");
        Ok(conn)
    }
}

#[async_trait]
impl AmiClient for ManagerClient {
    async fn execute_action(&self, action: AmiAction) -> Result<AmiResponse, AmiError> {
        let Some(config) = &self.config else {
            return Err(AmiError::NotConnected);
        };

        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(Self::connect(config).await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(AmiError::NotConnected);
        };

        let action_id = conn.next_action_id();
        let wire = action.to_wire(&action_id);
        match tokio::time::timeout(RESPONSE_TIMEOUT, round_trip(conn, &wire, &action_id)).await {
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(AmiError::ActionFailed(
                response
                    .message
                    .unwrap_or_else(|| format!("{} rejected by PBX", action.name())),
            )),
            Ok(Err(err)) => {
                // Protocol state is unknown after an I/O error; reconnect on
                // the next action.
                *guard = None;
                Err(err)
            }
            Err(_) => {
                *guard = None;
                Err(AmiError::Timeout)
            }
        }
    }
}

/// Writes one action and reads header blocks until the matching response
/// arrives. Event blocks and stale responses are skipped.
async fn round_trip(
    conn: &mut ManagerConnection,
    wire: &str,
    action_id: &str,
) -> Result<AmiResponse, AmiError> {
    conn.writer.write_all(wire.as_bytes()).await.map_err(AmiError::Io)?;
    conn.writer.flush().await.map_err(AmiError::Io)?;

    loop {
        let block = read_block(&mut conn.reader).await?;
        if block.get("Event").is_some() || block.get("Response").is_none() {
            continue;
        }
        match block.get("ActionID") {
            Some(id) if id != action_id => continue,
            _ => return Ok(block.into_response()),
        }
    }
}

/// Reads one blank-line-terminated header block.
async fn read_block(reader: &mut BufReader<OwnedReadHalf>) -> Result<MessageBlock, AmiError> {
    let mut block = MessageBlock::default();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.map_err(AmiError::Io)?;
        if n == 0 {
            return Err(AmiError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "manager connection closed",
            )));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if block.fields.is_empty() {
                continue;
            }
            return Ok(block);
        }
        block.push_line(line);
    }
}

/// One manager header block, order preserved. `Command` output lines (no
/// colon, `--END COMMAND--` marker) are kept with an empty key so they do not
/// shadow real headers.
#[derive(Debug, Default)]
struct MessageBlock {
    fields: Vec<(String, String)>,
}

impl MessageBlock {
    fn push_line(&mut self, line: &str) {
        match line.split_once(':') {
            Some((key, value)) => self
                .fields
                .push((key.trim().to_string(), value.trim().to_string())),
            None => self.fields.push((String::new(), line.to_string())),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    fn into_response(self) -> AmiResponse {
        AmiResponse {
            response: self.get("Response").unwrap_or_default().to_string(),
            message: self.get("Message").map(str::to_string),
        }
    }
}
