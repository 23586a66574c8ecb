//! RFC 1413 ident lookup, best effort.

use crate::constants::IDENT_TIMEOUT_SECS;
use crate::core_network::error::NetworkError;
use crate::core_network::interrupt::Interrupter;
use crate::core_network::socket::Socket;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

const IDENT_PORT: u16 = 113;

/// Queries the peer's ident daemon for the identity owning the connection
/// `remote -> local`. The whole exchange shares one 15-second budget.
pub async fn lookup(
    local: SocketAddr,
    remote: SocketAddr,
    interrupter: Interrupter,
) -> Result<String, NetworkError> {
    let deadline = Some(Instant::now() + Duration::from_secs(IDENT_TIMEOUT_SECS));
    let mut socket = Socket::connect(
        SocketAddr::new(remote.ip(), IDENT_PORT),
        deadline,
        interrupter,
    )
    .await?;

    let request = format!("{}, {}\r\n", remote.port(), local.port());
    socket.write_all(request.as_bytes(), deadline).await?;

    let mut response = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = socket.read(&mut buf, deadline).await?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&buf[..n]);
        if response.contains(&b'\n') || response.len() > 1024 {
            break;
        }
    }
    socket.shutdown().await;

    let line = String::from_utf8_lossy(&response);
    parse_response(line.lines().next().unwrap_or(""))
}

/// Parses `port, port : USERID : os : ident`.
fn parse_response(line: &str) -> Result<String, NetworkError> {
    let toks: Vec<&str> = line.split(':').collect();
    if toks.len() < 3 {
        return Err(NetworkError::Protocol("Malformed ident response".to_string()));
    }

    let ports: Vec<&str> = toks[0].split(',').collect();
    if ports.len() != 2
        || ports[0].trim().parse::<u16>().is_err()
        || ports[1].trim().parse::<u16>().is_err()
    {
        return Err(NetworkError::Protocol("Malformed ident response".to_string()));
    }

    let verdict = toks[1].trim().to_uppercase();
    if verdict == "ERROR" {
        return Err(NetworkError::Protocol(format!(
            "Ident error: {}",
            toks[2].trim()
        )));
    }
    if verdict != "USERID" || toks.len() != 4 {
        return Err(NetworkError::Protocol("Malformed ident response".to_string()));
    }

    Ok(toks[3].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::parse_response;

    #[test]
    fn parses_userid_response() {
        let ident = parse_response("6193, 23 : USERID : UNIX : stjohns").unwrap();
        assert_eq!(ident, "stjohns");
    }

    #[test]
    fn rejects_error_response() {
        assert!(parse_response("6195, 23 : ERROR : NO-USER").is_err());
    }

    #[test]
    fn rejects_malformed_ports() {
        assert!(parse_response("nonsense : USERID : UNIX : x").is_err());
        assert!(parse_response("1 : USERID : UNIX : x").is_err());
    }
}
