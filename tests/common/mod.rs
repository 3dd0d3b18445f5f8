//! In-process stand-ins for the Tor control port and Privoxy

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// How the fake control port wants to be authenticated
#[derive(Debug, Clone)]
pub enum FakeAuth {
    /// Advertise NULL, accept a bare AUTHENTICATE
    Null,
    /// Advertise COOKIE at this path and expect these bytes
    Cookie { path: String, cookie: Vec<u8> },
    /// Advertise HASHEDPASSWORD and expect this password
    Password(String),
    /// Advertise NULL but refuse every AUTHENTICATE
    Reject,
}

#[derive(Debug, Clone)]
pub struct FakeTorOptions {
    pub auth: FakeAuth,
    pub refuse_signals: bool,
    /// Drop the connection right after accepting this many NEWNYMs
    pub hang_up_after_signals: Option<usize>,
}

impl Default for FakeTorOptions {
    fn default() -> Self {
        Self {
            auth: FakeAuth::Null,
            refuse_signals: false,
            hang_up_after_signals: None,
        }
    }
}

pub struct FakeTor {
    pub addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
}

impl FakeTor {
    /// Commands received so far, without CRLF
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }
}

/// Serve one control connection
pub async fn spawn_fake_tor(options: FakeTorOptions) -> FakeTor {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&commands);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut signals = 0;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            let command = line.trim_end().to_string();
            log.lock().unwrap().push(command.clone());

            let (reply, mut hang_up) = reply_to(&command, &options);
            if command == "SIGNAL NEWNYM" && !options.refuse_signals {
                signals += 1;
                hang_up |= options.hang_up_after_signals == Some(signals);
            }
            if write_half.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
            if hang_up {
                break;
            }
        }
    });

    FakeTor { addr, commands }
}

fn reply_to(command: &str, options: &FakeTorOptions) -> (String, bool) {
    const AUTH_FAILED: &str = "515 Authentication failed: Password did not match HashedControlPassword *or* authentication cookie.\r\n";

    if command.starts_with("PROTOCOLINFO") {
        let auth = match &options.auth {
            FakeAuth::Null | FakeAuth::Reject => "METHODS=NULL".to_string(),
            FakeAuth::Cookie { path, .. } => {
                format!("METHODS=COOKIE,SAFECOOKIE COOKIEFILE=\"{}\"", path)
            },
            FakeAuth::Password(_) => "METHODS=HASHEDPASSWORD".to_string(),
        };
        return (
            format!(
                "250-PROTOCOLINFO 1\r\n250-AUTH {}\r\n250-VERSION Tor=\"0.4.8.10\"\r\n250 OK\r\n",
                auth
            ),
            false,
        );
    }

    if let Some(rest) = command.strip_prefix("AUTHENTICATE") {
        let given = rest.trim();
        let accepted = match &options.auth {
            FakeAuth::Null => given.is_empty(),
            FakeAuth::Cookie { cookie, .. } => given == hex(cookie),
            FakeAuth::Password(password) => given == hex(password.as_bytes()),
            FakeAuth::Reject => false,
        };
        return if accepted {
            ("250 OK\r\n".to_string(), false)
        } else {
            (AUTH_FAILED.to_string(), true)
        };
    }

    match command {
        "SIGNAL NEWNYM" if options.refuse_signals => (
            "552 Unrecognized signal code \"NEWNYM\"\r\n".to_string(),
            false,
        ),
        "SIGNAL NEWNYM" => ("250 OK\r\n".to_string(), false),
        "GETINFO status/bootstrap-phase" => (
            "250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=100 TAG=done SUMMARY=\"Done\"\r\n250 OK\r\n"
                .to_string(),
            false,
        ),
        "GETINFO circuit-status" => (
            "250+circuit-status=\r\n\
             1 BUILT $AAAA~relay1,$BBBB~relay2,$CCCC~relay3 PURPOSE=GENERAL\r\n\
             2 BUILT $DDDD~relay4,$EEEE~relay5,$FFFF~relay6 PURPOSE=GENERAL\r\n\
             .\r\n250 OK\r\n"
                .to_string(),
            false,
        ),
        "QUIT" => ("250 closing connection\r\n".to_string(), true),
        _ => ("510 Unrecognized command\r\n".to_string(), false),
    }
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct FakeProxy {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeProxy {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request lines received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Answer every request with the same status line and body
pub async fn spawn_fake_proxy(status: &str, body: &str) -> FakeProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let log = Arc::clone(&log);
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let first_line = request.lines().next().unwrap_or_default().to_string();
                log.lock().unwrap().push(first_line);

                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    FakeProxy { addr, requests }
}

/// Accept connections and never answer
pub async fn spawn_silent_proxy() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// An address nothing listens on
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
