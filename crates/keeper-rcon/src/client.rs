use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::{CommandSender, RconError};

const PACKET_AUTH: i32 = 3;
const PACKET_AUTH_RESPONSE: i32 = 2;
const PACKET_EXEC_COMMAND: i32 = 2;
const PACKET_RESPONSE_VALUE: i32 = 0;

const AUTH_ID: i32 = 1;
const COMMAND_ID: i32 = 2;
// Only sent once a full-size fragment shows the reply continues; answered after the last one.
const SENTINEL_ID: i32 = 3;

// The vanilla server takes each client packet from a single read into a 1460 byte buffer,
// so the client never has more than one packet in flight.
const MAX_COMMAND_LEN: usize = 1446;
// Replies longer than this are split across several packets.
const MAX_FRAGMENT_LEN: usize = 4096;
const MAX_PACKET_SIZE: i32 = 4096 + 10 + 4096;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection parameters for the remote console. Loaded once with the rest of the config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RconSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub password: String,
}

impl RconSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    25575
}

/// One connection per command, no session reuse.
pub struct RconClient {
    address: String,
    password: String,
    timeout: Duration,
}

struct Packet {
    id: i32,
    kind: i32,
    body: String,
}

impl RconClient {
    pub fn new(settings: &RconSettings) -> Self {
        Self {
            address: settings.address(),
            password: settings.password.clone(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub async fn execute(&self, command: &str) -> Result<String, RconError> {
        if command.len() > MAX_COMMAND_LEN {
            return Err(RconError::Protocol(format!(
                "command is {} bytes, the server accepts at most {MAX_COMMAND_LEN}",
                command.len()
            )));
        }

        match timeout(self.timeout, self.exchange(command)).await {
            Ok(result) => result,
            Err(_) => Err(RconError::Protocol(format!(
                "no reply from {} within {}s",
                self.address,
                self.timeout.as_secs()
            ))),
        }
    }

    async fn exchange(&self, command: &str) -> Result<String, RconError> {
        let mut stream = match TcpStream::connect(&self.address).await {
            Ok(stream) => stream,
            Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                return Err(RconError::Unreachable {
                    address: self.address.clone(),
                });
            }
            Err(err) => return Err(RconError::transport("connecting", err)),
        };

        self.authenticate(&mut stream).await?;

        write_packet(&mut stream, COMMAND_ID, PACKET_EXEC_COMMAND, command).await?;
        let first = read_packet(&mut stream).await?;
        if first.id != COMMAND_ID {
            return Err(RconError::Protocol(format!(
                "unexpected packet id {} in command reply",
                first.id
            )));
        }

        let mut body = first.body;
        if body.len() >= MAX_FRAGMENT_LEN {
            write_packet(&mut stream, SENTINEL_ID, PACKET_RESPONSE_VALUE, "").await?;
            loop {
                let packet = read_packet(&mut stream).await?;
                match packet.id {
                    COMMAND_ID => body.push_str(&packet.body),
                    SENTINEL_ID => break,
                    other => {
                        return Err(RconError::Protocol(format!(
                            "unexpected packet id {other} in command reply"
                        )));
                    }
                }
            }
        }

        debug!(command, bytes = body.len(), "rcon command answered");
        Ok(body)
    }

    async fn authenticate(&self, stream: &mut TcpStream) -> Result<(), RconError> {
        write_packet(stream, AUTH_ID, PACKET_AUTH, &self.password).await?;

        // Some implementations send an empty RESPONSE_VALUE ahead of the auth response.
        loop {
            let packet = read_packet(stream).await?;
            if packet.kind != PACKET_AUTH_RESPONSE {
                continue;
            }
            if packet.id == -1 {
                return Err(RconError::Auth);
            }
            return Ok(());
        }
    }
}

#[async_trait]
impl CommandSender for RconClient {
    async fn send(&self, command: &str) -> Result<String, RconError> {
        self.execute(command).await
    }
}

async fn write_packet(
    stream: &mut TcpStream,
    id: i32,
    kind: i32,
    payload: &str,
) -> Result<(), RconError> {
    let payload_bytes = payload.as_bytes();
    let size = (10 + payload_bytes.len()) as i32;

    let mut frame = Vec::with_capacity(payload_bytes.len() + 14);
    frame.extend_from_slice(&size.to_le_bytes());
    frame.extend_from_slice(&id.to_le_bytes());
    frame.extend_from_slice(&kind.to_le_bytes());
    frame.extend_from_slice(payload_bytes);
    frame.extend_from_slice(&[0, 0]);

    stream
        .write_all(&frame)
        .await
        .map_err(|err| RconError::transport("sending packet", err))
}

async fn read_packet(stream: &mut TcpStream) -> Result<Packet, RconError> {
    let size = stream
        .read_i32_le()
        .await
        .map_err(|err| RconError::transport("reading packet size", err))?;
    if !(10..=MAX_PACKET_SIZE).contains(&size) {
        return Err(RconError::Protocol(format!("invalid packet size {size}")));
    }

    let id = stream
        .read_i32_le()
        .await
        .map_err(|err| RconError::transport("reading packet id", err))?;
    let kind = stream
        .read_i32_le()
        .await
        .map_err(|err| RconError::transport("reading packet type", err))?;

    let mut payload = vec![0u8; (size - 10) as usize];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|err| RconError::transport("reading packet body", err))?;

    let mut trailer = [0u8; 2];
    stream
        .read_exact(&mut trailer)
        .await
        .map_err(|err| RconError::transport("reading packet trailer", err))?;

    Ok(Packet {
        id,
        kind,
        body: String::from_utf8_lossy(&payload).to_string(),
    })
}
