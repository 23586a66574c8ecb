//! The FTP data channel: endpoint negotiation and the transfer byte pump.

use crate::constants::{DATA_OPEN_TIMEOUT_SECS, PASV_BIND_ATTEMPTS};
use crate::core_network::error::NetworkError;
use crate::core_network::interrupt::Interrupter;
use crate::core_network::socket::Socket;
use crate::core_network::tls::TlsContext;
use crate::core_speed::{MinimumSpeedError, SpeedControl, TransferState};
use rand::Rng;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Clear,
    Private,
}

enum Endpoint {
    Idle,
    /// PORT/EPRT target the server connects back to.
    Active(SocketAddr),
    /// PASV/EPSV listener awaiting the client.
    Passive(TcpListener),
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    MinimumSpeed(#[from] MinimumSpeedError),

    #[error("file error: {0}")]
    File(std::io::Error),
}

/// Rewrites record boundaries for ASCII-mode sends: bare LF becomes CRLF.
/// `last` carries the final byte across chunk boundaries.
fn ascii_encode(input: &[u8], last: &mut u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 8);
    for &b in input {
        if b == b'\n' && *last != b'\r' {
            out.push(b'\r');
        }
        out.push(b);
        *last = b;
    }
    out
}

/// Inverse rewrite for ASCII-mode receives: CRLF becomes LF, lone CR is kept.
/// `pending_cr` carries a chunk-final CR over to the next call.
fn ascii_decode(input: &[u8], pending_cr: &mut bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for &b in input {
        if *pending_cr {
            *pending_cr = false;
            if b != b'\n' {
                out.push(b'\r');
            }
        }
        if b == b'\r' {
            *pending_cr = true;
        } else {
            out.push(b);
        }
    }
    out
}

/// Transient endpoint carrying file or listing bytes for one session.
///
/// Lifecycle: idle, configured by PORT/PASV and friends, opened at transfer
/// start, pumped, then returned to idle before the next command is read.
pub struct DataChannel {
    endpoint: Endpoint,
    transfer_type: TransferType,
    protection: Protection,
    interrupter: Interrupter,
    socket: Option<Socket>,
    state: TransferState,
    bytes_read: u64,
    bytes_written: u64,
}

impl DataChannel {
    pub fn new(interrupter: Interrupter) -> Self {
        Self {
            endpoint: Endpoint::Idle,
            transfer_type: TransferType::Binary,
            protection: Protection::Clear,
            interrupter,
            socket: None,
            state: TransferState::new(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    pub fn set_active(&mut self, target: SocketAddr) {
        self.endpoint = Endpoint::Active(target);
    }

    /// Binds a listener on a port from the configured range and records it
    /// as the pending passive endpoint. Returns the bound port.
    pub async fn listen_passive(
        &mut self,
        bind_ip: IpAddr,
        port_range: (u16, u16),
    ) -> Result<u16, NetworkError> {
        let (low, high) = port_range;
        if low > high {
            return Err(NetworkError::Protocol(
                "passive port range is inverted".to_string(),
            ));
        }
        let candidates: Vec<u16> = {
            let mut rng = rand::thread_rng();
            (0..PASV_BIND_ATTEMPTS)
                .map(|_| rng.gen_range(low..=high))
                .collect()
        };
        for port in candidates {
            match TcpListener::bind((bind_ip, port)).await {
                Ok(listener) => {
                    self.endpoint = Endpoint::Passive(listener);
                    return Ok(port);
                }
                Err(_) => continue,
            }
        }
        Err(NetworkError::System(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "no free passive ports",
        )))
    }

    pub fn set_type(&mut self, transfer_type: TransferType) {
        self.transfer_type = transfer_type;
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn set_protection(&mut self, protection: Protection) {
        self.protection = protection;
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self.endpoint, Endpoint::Idle)
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Connects or accepts per the configured mode, then wraps in TLS when
    /// protection is Private. `expected_ip` rejects third-party data
    /// connections on the passive path.
    pub async fn open(
        &mut self,
        tls: Option<&TlsContext>,
        expected_ip: Option<IpAddr>,
    ) -> Result<(), NetworkError> {
        let deadline_at = Instant::now() + Duration::from_secs(DATA_OPEN_TIMEOUT_SECS);
        let deadline = Some(deadline_at);
        let mut socket = match std::mem::replace(&mut self.endpoint, Endpoint::Idle) {
            Endpoint::Idle => {
                return Err(NetworkError::Protocol(
                    "data endpoint not configured".to_string(),
                ))
            }
            Endpoint::Active(target) => {
                Socket::connect(target, deadline, self.interrupter.clone()).await?
            }
            Endpoint::Passive(listener) => {
                let waiter = self.interrupter.clone();
                let accept = async {
                    tokio::time::timeout_at(deadline_at, listener.accept())
                        .await
                        .map_err(NetworkError::from)?
                        .map_err(NetworkError::from)
                };
                let (stream, peer) = tokio::select! {
                    _ = waiter.wait() => return Err(NetworkError::Interrupted),
                    result = accept => result?,
                };
                if let Some(expected) = expected_ip {
                    if peer.ip() != expected {
                        return Err(NetworkError::Protocol(format!(
                            "data connection from {} does not match control peer {}",
                            peer.ip(),
                            expected
                        )));
                    }
                }
                Socket::from_stream(stream, self.interrupter.clone())?
            }
        };

        if self.protection == Protection::Private {
            let tls = tls.ok_or_else(|| {
                NetworkError::Protocol("TLS requested on data channel but not configured".to_string())
            })?;
            socket.upgrade_tls(tls.acceptor(), deadline).await?;
        }

        self.socket = Some(socket);
        self.state.restart();
        Ok(())
    }

    /// Pumps `source` to the peer in `buffer_size` chunks, applying the
    /// speed controller after each one. Returns bytes put on the wire.
    pub async fn send(
        &mut self,
        source: &mut (impl AsyncRead + Unpin),
        speed: &mut SpeedControl,
        buffer_size: usize,
    ) -> Result<u64, TransferError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| NetworkError::Protocol("data channel not open".to_string()))?;
        let mut buffer = vec![0u8; buffer_size];
        let mut sent = 0u64;
        let mut last = 0u8;
        loop {
            let n = source.read(&mut buffer).await.map_err(TransferError::File)?;
            if n == 0 {
                break;
            }
            let chunk: Vec<u8>;
            let wire: &[u8] = if self.transfer_type == TransferType::Ascii {
                chunk = ascii_encode(&buffer[..n], &mut last);
                &chunk
            } else {
                &buffer[..n]
            };
            socket.write_all(wire, None).await?;
            sent += wire.len() as u64;
            self.state.add_bytes(wire.len() as u64);
            self.bytes_written += wire.len() as u64;
            speed.apply(&self.state).await?;
        }
        Ok(sent)
    }

    /// Pumps peer bytes into `sink` until the client closes the connection.
    /// Returns bytes taken off the wire.
    pub async fn recv(
        &mut self,
        sink: &mut (impl AsyncWrite + Unpin),
        speed: &mut SpeedControl,
        buffer_size: usize,
    ) -> Result<u64, TransferError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| NetworkError::Protocol("data channel not open".to_string()))?;
        let mut buffer = vec![0u8; buffer_size];
        let mut received = 0u64;
        let mut pending_cr = false;
        loop {
            let n = socket.read(&mut buffer, None).await?;
            if n == 0 {
                if pending_cr {
                    sink.write_all(b"\r").await.map_err(TransferError::File)?;
                }
                break;
            }
            received += n as u64;
            self.state.add_bytes(n as u64);
            self.bytes_read += n as u64;
            let chunk: Vec<u8>;
            let out: &[u8] = if self.transfer_type == TransferType::Ascii {
                chunk = ascii_decode(&buffer[..n], &mut pending_cr);
                &chunk
            } else {
                &buffer[..n]
            };
            sink.write_all(out).await.map_err(TransferError::File)?;
            speed.apply(&self.state).await?;
        }
        sink.flush().await.map_err(TransferError::File)?;
        Ok(received)
    }

    /// Shuts the connection and discards any pending endpoint. Always called
    /// before the next command is read.
    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            socket.shutdown().await;
        }
        self.endpoint = Endpoint::Idle;
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_acl::speed::TransferRules;
    use crate::core_counter::Counter;

    fn no_rules() -> SpeedControl {
        SpeedControl::test_with_rules(TransferRules::default(), Counter::upload_speeds())
    }

    #[test]
    fn ascii_encode_inserts_cr() {
        let mut last = 0u8;
        assert_eq!(ascii_encode(b"a\nb", &mut last), b"a\r\nb");
        // Existing CRLF passes through untouched.
        let mut last = 0u8;
        assert_eq!(ascii_encode(b"a\r\nb", &mut last), b"a\r\nb");
        // LF at a chunk head after a chunk-final CR is not doubled.
        let mut last = 0u8;
        let first = ascii_encode(b"a\r", &mut last);
        let second = ascii_encode(b"\nb", &mut last);
        let mut wire = first;
        wire.extend(second);
        assert_eq!(wire, b"a\r\nb");
    }

    #[test]
    fn ascii_decode_strips_cr_of_crlf() {
        let mut pending = false;
        assert_eq!(ascii_decode(b"a\r\nb", &mut pending), b"a\nb");
        assert!(!pending);
        // Split across chunks.
        let mut pending = false;
        let mut out = ascii_decode(b"a\r", &mut pending);
        assert!(pending);
        out.extend(ascii_decode(b"\nb", &mut pending));
        assert_eq!(out, b"a\nb");
        // Lone CR survives.
        let mut pending = false;
        let mut out = ascii_decode(b"a\rb", &mut pending);
        out.extend(ascii_decode(b"", &mut pending));
        assert_eq!(out, b"a\rb");
    }

    #[tokio::test]
    async fn passive_roundtrip_binary() {
        let mut channel = DataChannel::new(Interrupter::new());
        let port = channel
            .listen_passive("127.0.0.1".parse().unwrap(), (20000, 65000))
            .await
            .unwrap();

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        channel.open(None, None).await.unwrap();
        assert!(channel.is_open());
        let mut source = std::io::Cursor::new(b"payload bytes".to_vec());
        let sent = channel.send(&mut source, &mut no_rules(), 4).await.unwrap();
        assert_eq!(sent, 13);
        channel.close().await;
        assert!(!channel.is_open() && !channel.is_configured());

        assert_eq!(client.await.unwrap(), b"payload bytes");
        assert_eq!(channel.bytes_written(), 13);
    }

    #[tokio::test]
    async fn passive_recv_ascii_translates() {
        let mut channel = DataChannel::new(Interrupter::new());
        channel.set_type(TransferType::Ascii);
        let port = channel
            .listen_passive("127.0.0.1".parse().unwrap(), (20000, 65000))
            .await
            .unwrap();

        let client = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .unwrap();
            stream.write_all(b"a\r\nb").await.unwrap();
        });

        channel.open(None, None).await.unwrap();
        let mut sink = Vec::new();
        channel.recv(&mut sink, &mut no_rules(), 4096).await.unwrap();
        channel.close().await;
        client.await.unwrap();
        assert_eq!(sink, b"a\nb");
    }

    #[tokio::test]
    async fn open_without_endpoint_fails() {
        let mut channel = DataChannel::new(Interrupter::new());
        assert!(matches!(
            channel.open(None, None).await,
            Err(NetworkError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn rejects_third_party_passive_connection() {
        // The only address we can test from is loopback, so expect a
        // different one and verify the mismatch path.
        let mut channel = DataChannel::new(Interrupter::new());
        let port = channel
            .listen_passive("127.0.0.1".parse().unwrap(), (20000, 65000))
            .await
            .unwrap();
        let client = tokio::spawn(async move {
            let _ = tokio::net::TcpStream::connect(("127.0.0.1", port)).await;
        });
        let result = channel
            .open(None, Some("10.1.2.3".parse().unwrap()))
            .await;
        assert!(matches!(result, Err(NetworkError::Protocol(_))));
        client.await.unwrap();
    }
}
