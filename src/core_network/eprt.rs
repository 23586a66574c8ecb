use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use std::net::{IpAddr, SocketAddr};

/// Parses `|<proto>|<addr>|<port>|` with an arbitrary delimiter byte.
fn parse_eprt_arg(arg: &str) -> Option<SocketAddr> {
    let delimiter = arg.chars().next()?;
    let fields: Vec<&str> = arg.split(delimiter).collect();
    // Leading and trailing delimiters produce empty first and last fields.
    if fields.len() != 5 || !fields[0].is_empty() || !fields[4].is_empty() {
        return None;
    }
    let proto = fields[1];
    let ip: IpAddr = fields[2].parse().ok()?;
    let port: u16 = fields[3].parse().ok()?;
    if port == 0 {
        return None;
    }
    match (proto, ip) {
        ("1", IpAddr::V4(_)) | ("2", IpAddr::V6(_)) => Some(SocketAddr::new(ip, port)),
        _ => None,
    }
}

/// Handles EPRT (RFC 2428): protocol-agnostic active mode.
pub async fn handle_eprt_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if client.epsv_all {
        return Err(CommandError::failed(
            ReplyCode::SYNTAX_ERROR,
            "EPRT not allowed after EPSV ALL.",
        ));
    }

    let target = match parse_eprt_arg(&args[0]) {
        Some(target) => target,
        None => {
            return Err(CommandError::failed(
                ReplyCode::NETWORK_PROTOCOL_UNSUPPORTED,
                "Network protocol not supported, use (1,2)",
            ))
        }
    };
    if target.ip() != client.peer_ip() {
        return Err(CommandError::failed(
            ReplyCode::SYNTAX_ERROR,
            "EPRT address must match the control connection.",
        ));
    }

    client.data.set_active(target);
    client
        .reply(ReplyCode::COMMAND_OKAY, "EPRT command successful.")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_and_ipv6() {
        let v4 = parse_eprt_arg("|1|132.235.1.2|6275|").unwrap();
        assert_eq!(v4.to_string(), "132.235.1.2:6275");
        let v6 = parse_eprt_arg("|2|1080::8:800:200C:417A|5282|").unwrap();
        assert_eq!(v6.port(), 5282);
    }

    #[test]
    fn rejects_protocol_mismatch_and_junk() {
        assert!(parse_eprt_arg("|2|132.235.1.2|6275|").is_none());
        assert!(parse_eprt_arg("|1|1080::1|6275|").is_none());
        assert!(parse_eprt_arg("|1|132.235.1.2|0|").is_none());
        assert!(parse_eprt_arg("1|132.235.1.2|6275").is_none());
        assert!(parse_eprt_arg("").is_none());
    }
}
