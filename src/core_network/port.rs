use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Parses `h1,h2,h3,h4,p1,p2` into a socket address.
fn parse_port_arg(arg: &str) -> Option<SocketAddr> {
    let parts: Vec<u8> = arg
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
    let port = u16::from(parts[4]) * 256 + u16::from(parts[5]);
    if port == 0 {
        return None;
    }
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Handles PORT: records the client's endpoint for an active-mode transfer.
/// The target must match the control connection's address.
pub async fn handle_port_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if client.epsv_all {
        return Err(CommandError::failed(
            ReplyCode::SYNTAX_ERROR,
            "PORT not allowed after EPSV ALL.",
        ));
    }

    let target = parse_port_arg(&args[0]).ok_or(CommandError::Syntax)?;
    if target.ip() != client.peer_ip() {
        return Err(CommandError::failed(
            ReplyCode::SYNTAX_ERROR,
            "PORT address must match the control connection.",
        ));
    }

    client.data.set_active(target);
    client
        .reply(ReplyCode::COMMAND_OKAY, "PORT command successful.")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_port_argument() {
        let addr = parse_port_arg("10,0,0,7,4,1").unwrap();
        assert_eq!(addr.ip().to_string(), "10.0.0.7");
        assert_eq!(addr.port(), 4 * 256 + 1);
    }

    #[test]
    fn rejects_malformed_port_arguments() {
        assert!(parse_port_arg("10,0,0,7,4").is_none());
        assert!(parse_port_arg("10,0,0,7,4,1,9").is_none());
        assert!(parse_port_arg("256,0,0,7,4,1").is_none());
        assert!(parse_port_arg("10,0,0,7,0,0").is_none());
        assert!(parse_port_arg("nonsense").is_none());
    }
}
