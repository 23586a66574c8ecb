//! Line-oriented FTP command/reply exchange over a [`Socket`].

use crate::core_network::error::NetworkError;
use crate::core_network::reply::ReplyCode;
use crate::core_network::socket::Socket;
use std::time::Duration;
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK: usize = 1024;

pub struct ControlChannel {
    socket: Socket,
    buffer: Vec<u8>,
    bytes_read: u64,
    bytes_written: u64,
}

impl ControlChannel {
    pub fn new(socket: Socket) -> Self {
        Self {
            socket,
            buffer: Vec::new(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Reads one CRLF-terminated command line, stripped of its terminator.
    ///
    /// Blocks up to `deadline`. Timeout raises [`NetworkError::Timeout`], a
    /// peer close [`NetworkError::EndOfStream`], external cancellation
    /// [`NetworkError::Interrupted`].
    pub async fn next_command(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<String, NetworkError> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.socket.read(&mut chunk, deadline).await?;
            if n == 0 {
                return Err(NetworkError::EndOfStream);
            }
            self.bytes_read += n as u64;
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Bounded wait for a bouncer's IDNT preamble; empty string on timeout.
    pub async fn wait_for_idnt(&mut self, wait: Duration) -> Result<String, NetworkError> {
        match self.next_command(Some(Instant::now() + wait)).await {
            Ok(line) => Ok(line),
            Err(NetworkError::Timeout) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Blocks until the client sends ABOR; used while a transfer is running.
    /// Anything else arriving mid-transfer is discarded.
    pub async fn wait_for_abor(&mut self) -> Result<(), NetworkError> {
        loop {
            let line = self.next_command(None).await?;
            // Telnet IP/Synch bytes may precede an urgent ABOR.
            let line = line.trim_start_matches(|c: char| c >= '\u{f0}' || c == '\u{0}');
            if line.trim().eq_ignore_ascii_case("ABOR") {
                return Ok(());
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
        let mut end = raw.len() - 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
        Some(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Sends `code text`. Embedded newlines produce the standard multi-line
    /// form: `nnn-…` continuations closed by a final `nnn …` line.
    pub async fn reply(&mut self, code: ReplyCode, text: &str) -> Result<(), NetworkError> {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut message = String::new();
        for (i, line) in lines.iter().enumerate() {
            let line = line.trim_end_matches('\r');
            if i + 1 == lines.len() {
                message.push_str(&format!("{} {}\r\n", code, line));
            } else {
                message.push_str(&format!("{}-{}\r\n", code, line));
            }
        }
        self.send_raw(message.as_bytes()).await
    }

    /// Sends continuation lines (`nnn-text`) without closing the reply;
    /// used to stream SITE EXEC output before the terminal reply.
    pub async fn part_reply(&mut self, code: ReplyCode, text: &str) -> Result<(), NetworkError> {
        let mut message = String::new();
        for line in text.split('\n') {
            message.push_str(&format!("{}-{}\r\n", code, line.trim_end_matches('\r')));
        }
        self.send_raw(message.as_bytes()).await
    }

    /// Sends bare continuation text inside an open multi-line reply, e.g.
    /// the space-prefixed fact line of an MLST response.
    pub async fn send_text(&mut self, text: &str) -> Result<(), NetworkError> {
        self.send_raw(format!("{}\r\n", text).as_bytes()).await
    }

    async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), NetworkError> {
        self.socket.write_all(bytes, None).await?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    pub async fn upgrade_tls(&mut self, acceptor: TlsAcceptor) -> Result<(), NetworkError> {
        if !self.buffer.is_empty() {
            return Err(NetworkError::Protocol(
                "data pipelined before TLS handshake".to_string(),
            ));
        }
        self.socket
            .upgrade_tls(acceptor, Some(Instant::now() + TLS_HANDSHAKE_TIMEOUT))
            .await
    }

    pub fn strip_tls(&mut self) -> Result<(), NetworkError> {
        self.socket.strip_tls()
    }

    pub fn is_tls(&self) -> bool {
        self.socket.is_tls()
    }

    pub fn cipher(&self) -> Option<String> {
        self.socket.cipher()
    }

    pub fn peer_addr(&self) -> std::net::SocketAddr {
        self.socket.peer_addr()
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.socket.local_addr()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub async fn shutdown(&mut self) {
        self.socket.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::interrupt::Interrupter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn channel_pair() -> (ControlChannel, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let socket = Socket::from_stream(server, Interrupter::new()).unwrap();
        (ControlChannel::new(socket), client)
    }

    #[tokio::test]
    async fn reads_crlf_terminated_commands() {
        let (mut channel, mut client) = channel_pair().await;
        client.write_all(b"USER alice\r\nPASS pw\r\n").await.unwrap();
        assert_eq!(channel.next_command(None).await.unwrap(), "USER alice");
        assert_eq!(channel.next_command(None).await.unwrap(), "PASS pw");
        assert_eq!(channel.bytes_read(), 21);
    }

    #[tokio::test]
    async fn accepts_bare_lf() {
        let (mut channel, mut client) = channel_pair().await;
        client.write_all(b"NOOP\n").await.unwrap();
        assert_eq!(channel.next_command(None).await.unwrap(), "NOOP");
    }

    #[tokio::test]
    async fn eof_raises_end_of_stream() {
        let (mut channel, client) = channel_pair().await;
        drop(client);
        match channel.next_command(None).await {
            Err(NetworkError::EndOfStream) => {}
            other => panic!("expected end of stream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn single_line_reply_format() {
        let (mut channel, mut client) = channel_pair().await;
        channel
            .reply(ReplyCode::SERVICE_READY, "ferroftpd ready.")
            .await
            .unwrap();
        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"220 ferroftpd ready.\r\n");
    }

    #[tokio::test]
    async fn multi_line_reply_format() {
        let (mut channel, mut client) = channel_pair().await;
        channel
            .reply(ReplyCode::SYSTEM_STATUS, "status\nof things\nend")
            .await
            .unwrap();
        let mut buf = [0u8; 128];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"211-status\r\n211-of things\r\n211 end\r\n");
    }

    #[tokio::test]
    async fn wait_for_idnt_times_out_to_empty() {
        let (mut channel, _client) = channel_pair().await;
        let line = channel
            .wait_for_idnt(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(line, "");
    }

    #[tokio::test]
    async fn wait_for_abor_skips_other_lines() {
        let (mut channel, mut client) = channel_pair().await;
        client.write_all(b"NOOP\r\nabor\r\n").await.unwrap();
        channel.wait_for_abor().await.unwrap();
    }
}
