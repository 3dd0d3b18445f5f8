//! Tor Control Port client
//!
//! Communicates with the local Tor daemon via the control protocol.
//! Only the handful of commands a circuit rotator needs are spoken here:
//! PROTOCOLINFO, AUTHENTICATE, SIGNAL, GETINFO and QUIT.

use crate::config::TorConfig;
use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Common cookie file locations
const COOKIE_PATHS: &[&str] = &[
    "/run/tor/control.authcookie",
    "/var/run/tor/control.authcookie",
    "/var/lib/tor/control_auth_cookie",
];

/// Tor auth cookies are always 32 bytes
const COOKIE_LEN: usize = 32;

/// Failure talking to the control port
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control connection I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for Tor reply after {0:?}")]
    Timeout(Duration),

    #[error("control connection closed by Tor")]
    Closed,

    #[error("Tor control error: {code} {message}")]
    Rejected { code: u16, message: String },

    #[error("malformed control reply: {0:?}")]
    Malformed(String),
}

impl ControlError {
    /// Tor understood the command and refused it; the connection is still usable
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Signals accepted by `SIGNAL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Switch to clean circuits for new connections
    Newnym,
    ClearDnsCache,
    Reload,
    Heartbeat,
    Dump,
    Debug,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Newnym => "NEWNYM",
            Signal::ClearDnsCache => "CLEARDNSCACHE",
            Signal::Reload => "RELOAD",
            Signal::Heartbeat => "HEARTBEAT",
            Signal::Dump => "DUMP",
            Signal::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication method advertised in PROTOCOLINFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Null,
    HashedPassword,
    Cookie,
    SafeCookie,
    Other(String),
}

impl AuthMethod {
    fn parse(name: &str) -> Self {
        match name {
            "NULL" => AuthMethod::Null,
            "HASHEDPASSWORD" => AuthMethod::HashedPassword,
            "COOKIE" => AuthMethod::Cookie,
            "SAFECOOKIE" => AuthMethod::SafeCookie,
            other => AuthMethod::Other(other.to_string()),
        }
    }
}

/// Parsed PROTOCOLINFO reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub auth_methods: Vec<AuthMethod>,
    pub cookie_file: Option<PathBuf>,
    pub tor_version: Option<String>,
}

impl ProtocolInfo {
    /// Parse the body of a PROTOCOLINFO reply
    ///
    /// ```text
    /// 250-PROTOCOLINFO 1
    /// 250-AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE="/run/tor/control.authcookie"
    /// 250-VERSION Tor="0.4.8.10"
    /// ```
    pub fn parse(reply: &str) -> Self {
        let mut info = ProtocolInfo::default();

        for line in reply.lines() {
            let line = strip_status(line.trim_end());

            if let Some(rest) = line.strip_prefix("AUTH ") {
                for (key, value) in keyword_args(rest) {
                    match key.as_str() {
                        "METHODS" => {
                            info.auth_methods = value
                                .split(',')
                                .filter(|m| !m.is_empty())
                                .map(AuthMethod::parse)
                                .collect();
                        },
                        "COOKIEFILE" => info.cookie_file = Some(PathBuf::from(value)),
                        _ => {},
                    }
                }
            } else if let Some(rest) = line.strip_prefix("VERSION ") {
                info.tor_version = keyword_args(rest)
                    .into_iter()
                    .find(|(key, _)| key == "Tor")
                    .map(|(_, value)| value);
            }
        }

        info
    }

    pub fn offers(&self, method: &AuthMethod) -> bool {
        self.auth_methods.contains(method)
    }
}

/// Drop the `250-` / `250 ` / `250+` prefix from a reply line
fn strip_status(line: &str) -> &str {
    let bytes = line.as_bytes();
    if bytes.len() >= 4
        && bytes[..3].iter().all(u8::is_ascii_digit)
        && matches!(bytes[3], b' ' | b'-' | b'+')
    {
        &line[4..]
    } else {
        line
    }
}

/// Split `KEY=value KEY="quoted \"value\""` into pairs
fn keyword_args(input: &str) -> Vec<(String, String)> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ' ' {
                break;
            }
            key.push(c);
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            if chars.peek() == Some(&'"') {
                chars.next();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        },
                        '"' => break,
                        other => value.push(other),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == ' ' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }

        args.push((key, value));
    }

    args
}

/// Parse the three-digit status code of a reply line
fn status_code(line: &str) -> Option<u16> {
    let code = line.get(..3)?;
    if code.bytes().all(|b| b.is_ascii_digit()) {
        code.parse().ok()
    } else {
        None
    }
}

/// Connection to Tor control port
pub struct TorController {
    stream: BufReader<TcpStream>,
    reply_timeout: Duration,
    authenticated: bool,
    protocol_info: Option<ProtocolInfo>,
}

impl TorController {
    /// Connect to Tor control port and authenticate
    pub async fn connect(config: &TorConfig) -> Result<Self> {
        let addr = config.control_addr();
        debug!("Connecting to Tor control port: {}", addr);

        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("Failed to connect to Tor at {}", addr))?;

        let mut controller = Self {
            stream: BufReader::new(stream),
            reply_timeout: Duration::from_secs(config.reply_timeout_secs),
            authenticated: false,
            protocol_info: None,
        };

        controller
            .authenticate(config)
            .await
            .with_context(|| format!("Failed to authenticate to Tor at {}", addr))?;

        info!("Authenticated to Tor control port at {}", addr);
        Ok(controller)
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// PROTOCOLINFO reply seen during authentication, if Tor answered it
    pub fn protocol_info(&self) -> Option<&ProtocolInfo> {
        self.protocol_info.as_ref()
    }

    async fn authenticate(&mut self, config: &TorConfig) -> Result<()> {
        if let Some(password) = &config.control_password {
            return self.authenticate_password(password).await;
        }

        let info = match self.query_protocol_info().await {
            Ok(info) => {
                debug!(
                    "Tor {} offers auth methods {:?}",
                    info.tor_version.as_deref().unwrap_or("(unknown version)"),
                    info.auth_methods
                );
                self.protocol_info = Some(info.clone());
                Some(info)
            },
            Err(e) if e.is_rejection() => {
                debug!("PROTOCOLINFO refused: {}", e);
                None
            },
            Err(e) => return Err(e.into()),
        };

        if let Some(info) = &info {
            if info.offers(&AuthMethod::Null) {
                return self.authenticate_null().await;
            }
            if !info.offers(&AuthMethod::Cookie) && !info.offers(&AuthMethod::SafeCookie) {
                if info.offers(&AuthMethod::HashedPassword) {
                    bail!("Tor requires a control password; set tor.control_password");
                }
                bail!(
                    "No supported authentication method (offered: {:?})",
                    info.auth_methods
                );
            }
        }

        let cookie_file = info.as_ref().and_then(|i| i.cookie_file.as_deref());
        match find_cookie(cookie_file, config.cookie_path.as_deref()) {
            Some((path, cookie)) => self.authenticate_cookie(&path, &cookie).await,
            None if info.is_none() => {
                // No PROTOCOLINFO and no cookie on disk: NULL auth is all that is left
                self.authenticate_null().await
            },
            None => bail!("No readable Tor auth cookie found"),
        }
    }

    /// Authenticate with password (hex-encoded for HashedControlPassword)
    async fn authenticate_password(&mut self, password: &str) -> Result<()> {
        let password_hex = data_encoding::HEXLOWER.encode(password.as_bytes());
        self.send_secret("AUTHENTICATE", &password_hex).await?;
        self.authenticated = true;
        debug!("Authenticated with control password");
        Ok(())
    }

    /// Authenticate with cookie contents
    async fn authenticate_cookie(&mut self, path: &Path, cookie: &[u8]) -> Result<()> {
        let cookie_hex = data_encoding::HEXLOWER.encode(cookie);
        self.send_secret("AUTHENTICATE", &cookie_hex).await?;
        self.authenticated = true;
        debug!("Authenticated with cookie from {}", path.display());
        Ok(())
    }

    async fn authenticate_null(&mut self) -> Result<()> {
        debug!("Trying null authentication");
        self.send_command("AUTHENTICATE").await?;
        self.authenticated = true;
        Ok(())
    }

    /// Ask Tor which authentication methods it accepts
    pub async fn query_protocol_info(&mut self) -> Result<ProtocolInfo, ControlError> {
        let reply = self.send_command("PROTOCOLINFO 1").await?;
        Ok(ProtocolInfo::parse(&reply))
    }

    /// Send a signal
    pub async fn signal(&mut self, signal: Signal) -> Result<(), ControlError> {
        self.send_command(&format!("SIGNAL {}", signal)).await?;
        debug!("Signal {} accepted", signal);
        Ok(())
    }

    /// Get information about the Tor daemon
    ///
    /// Returns the value for `keyword`, joining data-block lines with `\n`.
    pub async fn get_info(&mut self, keyword: &str) -> Result<String, ControlError> {
        let reply = self.send_command(&format!("GETINFO {}", keyword)).await?;
        Ok(info_value(&reply, keyword))
    }

    /// Check if Tor is fully bootstrapped
    pub async fn is_bootstrapped(&mut self) -> Result<bool, ControlError> {
        let phase = self.get_info("status/bootstrap-phase").await?;
        Ok(phase.contains("PROGRESS=100"))
    }

    /// Get circuit status, one circuit per line
    pub async fn get_circuit_status(&mut self) -> Result<String, ControlError> {
        self.get_info("circuit-status").await
    }

    /// Say goodbye and close the connection
    pub async fn quit(mut self) -> Result<(), ControlError> {
        let result = self.send_command("QUIT").await;
        // Tor hangs up after QUIT; a missing reply is not worth reporting
        let result = match result {
            Err(ControlError::Closed) => Ok(String::new()),
            other => other,
        };
        if let Err(e) = self.stream.get_mut().shutdown().await {
            debug!("Control socket shutdown: {}", e);
        }
        debug!("Control connection closed");
        result.map(|_| ())
    }

    /// Send a command whose argument must not appear in logs
    async fn send_secret(&mut self, verb: &str, secret: &str) -> Result<String, ControlError> {
        debug!("Sending Tor command: {} <redacted>", verb);
        self.write_line(&format!("{} {}", verb, secret)).await?;
        self.read_reply().await
    }

    /// Send a command and read response
    async fn send_command(&mut self, cmd: &str) -> Result<String, ControlError> {
        debug!("Sending Tor command: {}", cmd);
        self.write_line(cmd).await?;
        self.read_reply().await
    }

    async fn write_line(&mut self, cmd: &str) -> Result<(), ControlError> {
        let stream = self.stream.get_mut();
        stream.write_all(cmd.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read one complete reply
    ///
    /// Format: `250-key=value` lines, optional `250+key=` data blocks ending
    /// in a lone `.`, and a final `NNN text` line.
    async fn read_reply(&mut self) -> Result<String, ControlError> {
        let mut response = String::new();
        let mut in_data_block = false;

        loop {
            let mut line = String::new();
            let bytes_read =
                match tokio::time::timeout(self.reply_timeout, self.stream.read_line(&mut line))
                    .await
                {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!("Timeout waiting for Tor response");
                        return Err(ControlError::Timeout(self.reply_timeout));
                    },
                };

            if bytes_read == 0 {
                return Err(ControlError::Closed);
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);

            if in_data_block {
                if trimmed == "." {
                    in_data_block = false;
                } else {
                    response.push_str(trimmed.strip_prefix('.').unwrap_or(trimmed));
                    response.push('\n');
                }
                continue;
            }

            // Asynchronous events are not subscribed to, but skip them anyway
            if trimmed.starts_with("650") {
                continue;
            }

            let code = status_code(trimmed)
                .ok_or_else(|| ControlError::Malformed(trimmed.to_string()))?;

            match trimmed.as_bytes().get(3) {
                Some(b'+') => {
                    in_data_block = true;
                    response.push_str(trimmed);
                    response.push('\n');
                },
                Some(b'-') => {
                    response.push_str(trimmed);
                    response.push('\n');
                },
                Some(b' ') | None => {
                    if (200..300).contains(&code) {
                        debug!("Tor reply: {}", trimmed);
                        return Ok(response);
                    }
                    let message = trimmed.get(4..).unwrap_or_default().to_string();
                    warn!("Tor control error: {}", trimmed);
                    return Err(ControlError::Rejected { code, message });
                },
                Some(_) => return Err(ControlError::Malformed(trimmed.to_string())),
            }
        }
    }
}

/// Extract the value for `keyword` from a GETINFO reply
fn info_value(reply: &str, keyword: &str) -> String {
    let single = format!("250-{}=", keyword);
    let block = format!("250+{}=", keyword);

    let mut lines = reply.lines();
    while let Some(line) = lines.next() {
        if let Some(value) = line.strip_prefix(&single) {
            return value.to_string();
        }
        if line.starts_with(&block) {
            return lines.collect::<Vec<_>>().join("\n");
        }
    }
    reply.trim().to_string()
}

/// Pick the first readable cookie of the right size
///
/// Order: the file Tor named in PROTOCOLINFO, the configured path, then
/// the usual system locations. Tor drops the connection after a failed
/// AUTHENTICATE, so the choice has to be made before sending anything.
fn find_cookie(advertised: Option<&Path>, configured: Option<&Path>) -> Option<(PathBuf, Vec<u8>)> {
    let candidates = advertised
        .into_iter()
        .chain(configured)
        .map(Path::to_path_buf)
        .chain(COOKIE_PATHS.iter().map(PathBuf::from));

    for path in candidates {
        match std::fs::read(&path) {
            Ok(cookie) if cookie.len() == COOKIE_LEN => return Some((path, cookie)),
            Ok(cookie) => {
                debug!(
                    "Ignoring cookie {} with unexpected length {}",
                    path.display(),
                    cookie.len()
                );
            },
            Err(e) => debug!("Cookie {} not readable: {}", path.display(), e),
        }
    }
    None
}
