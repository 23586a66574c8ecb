//! Cancellable, deadline-bounded byte stream, optionally TLS-wrapped.

use crate::core_network::error::NetworkError;
use crate::core_network::interrupt::Interrupter;
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    /// Transient state while a handshake owns the transport.
    Detached,
}

/// A connected socket whose every blocking operation honours a per-call
/// deadline and the session's interruption bit.
pub struct Socket {
    stream: Stream,
    interrupter: Interrupter,
    peer: SocketAddr,
    local: SocketAddr,
}

async fn bounded<F, T>(deadline: Option<Instant>, io: F) -> Result<T, NetworkError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match deadline {
        Some(deadline) => timeout_at(deadline, io).await?.map_err(NetworkError::from),
        None => io.await.map_err(NetworkError::from),
    }
}

impl Socket {
    pub fn from_stream(stream: TcpStream, interrupter: Interrupter) -> Result<Self, NetworkError> {
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        Ok(Self {
            stream: Stream::Plain(stream),
            interrupter,
            peer,
            local,
        })
    }

    /// Connects to `addr`, bounded by `deadline` and the interruption bit.
    pub async fn connect(
        addr: SocketAddr,
        deadline: Option<Instant>,
        interrupter: Interrupter,
    ) -> Result<Self, NetworkError> {
        if interrupter.is_interrupted() {
            return Err(NetworkError::Interrupted);
        }
        let waiter = interrupter.clone();
        let stream = tokio::select! {
            _ = waiter.wait() => return Err(NetworkError::Interrupted),
            result = bounded(deadline, TcpStream::connect(addr)) => result?,
        };
        Socket::from_stream(stream, interrupter)
    }

    /// Reads into `buf`. Returns `Ok(0)` at end of stream; the caller decides
    /// whether that is an error or a clean finish.
    pub async fn read(
        &mut self,
        buf: &mut [u8],
        deadline: Option<Instant>,
    ) -> Result<usize, NetworkError> {
        if self.interrupter.is_interrupted() {
            return Err(NetworkError::Interrupted);
        }
        let waiter = self.interrupter.clone();
        let stream = &mut self.stream;
        let io = async move {
            match stream {
                Stream::Plain(s) => s.read(buf).await,
                Stream::Tls(s) => s.read(buf).await,
                Stream::Detached => Err(std::io::ErrorKind::NotConnected.into()),
            }
        };
        tokio::select! {
            biased;
            _ = waiter.wait() => Err(NetworkError::Interrupted),
            result = bounded(deadline, io) => result,
        }
    }

    /// Writes the whole buffer. Interruption only cancels a write that
    /// cannot make progress; a writable socket still takes final replies
    /// (`421`, `426`) after the session has been told to stop.
    pub async fn write_all(
        &mut self,
        buf: &[u8],
        deadline: Option<Instant>,
    ) -> Result<(), NetworkError> {
        let waiter = self.interrupter.clone();
        let stream = &mut self.stream;
        let io = async move {
            match stream {
                Stream::Plain(s) => s.write_all(buf).await,
                Stream::Tls(s) => s.write_all(buf).await,
                Stream::Detached => Err(std::io::ErrorKind::NotConnected.into()),
            }
        };
        tokio::select! {
            biased;
            result = bounded(deadline, io) => result,
            _ = waiter.wait() => Err(NetworkError::Interrupted),
        }
    }

    /// Wraps the connected socket in TLS via a server-side handshake.
    ///
    /// On handshake failure the transport is gone; the socket stays detached
    /// and every later call fails, which unwinds the session.
    pub async fn upgrade_tls(
        &mut self,
        acceptor: TlsAcceptor,
        deadline: Option<Instant>,
    ) -> Result<(), NetworkError> {
        let tcp = match std::mem::replace(&mut self.stream, Stream::Detached) {
            Stream::Plain(tcp) => tcp,
            other => {
                self.stream = other;
                return Err(NetworkError::Protocol("connection is already TLS".to_string()));
            }
        };
        let waiter = self.interrupter.clone();
        let tls = tokio::select! {
            _ = waiter.wait() => return Err(NetworkError::Interrupted),
            result = bounded(deadline, acceptor.accept(tcp)) => result?,
        };
        self.stream = Stream::Tls(Box::new(tls));
        Ok(())
    }

    /// Strips an established TLS layer, continuing in clear (CCC).
    pub fn strip_tls(&mut self) -> Result<(), NetworkError> {
        match std::mem::replace(&mut self.stream, Stream::Detached) {
            Stream::Tls(tls) => {
                let (tcp, _) = tls.into_inner();
                self.stream = Stream::Plain(tcp);
                Ok(())
            }
            other => {
                self.stream = other;
                Err(NetworkError::Protocol("connection is not TLS".to_string()))
            }
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }

    /// Negotiated cipher suite name, or None on a clear connection.
    pub fn cipher(&self) -> Option<String> {
        match &self.stream {
            Stream::Tls(tls) => tls
                .get_ref()
                .1
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite())),
            _ => None,
        }
    }

    /// Idempotent; errors from an already-closed peer are discarded.
    pub async fn shutdown(&mut self) {
        match &mut self.stream {
            Stream::Plain(s) => {
                let _ = s.shutdown().await;
            }
            Stream::Tls(s) => {
                let _ = s.shutdown().await;
            }
            Stream::Detached => {}
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn interrupter(&self) -> &Interrupter {
        &self.interrupter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn pair() -> (Socket, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (
            Socket::from_stream(server, Interrupter::new()).unwrap(),
            client,
        )
    }

    #[tokio::test]
    async fn read_honours_deadline() {
        let (mut socket, _client) = pair().await;
        let mut buf = [0u8; 16];
        let deadline = Some(Instant::now() + Duration::from_millis(50));
        match socket.read(&mut buf, deadline).await {
            Err(NetworkError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn read_returns_zero_on_peer_close() {
        let (mut socket, client) = pair().await;
        drop(client);
        let mut buf = [0u8; 16];
        let n = socket.read(&mut buf, None).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn interrupt_fails_blocked_read() {
        let (mut socket, _client) = pair().await;
        let interrupter = socket.interrupter().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupter.interrupt();
        });
        let mut buf = [0u8; 16];
        match socket.read(&mut buf, None).await {
            Err(NetworkError::Interrupted) => {}
            other => panic!("expected interruption, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (mut socket, _client) = pair().await;
        socket.shutdown().await;
        socket.shutdown().await;
    }
}
