use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use log::debug;
use std::net::IpAddr;

/// Sets up a passive mode (PASV) listener and advertises it to the client.
///
/// The listener binds a random port from the configured range; the reply
/// carries the advertised address in `h1,h2,h3,h4,p1,p2` form. Running out
/// of ports is a `425`, never a panic.
pub async fn handle_pasv_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    if client.epsv_all {
        return Err(CommandError::failed(
            ReplyCode::SYNTAX_ERROR,
            "PASV not allowed after EPSV ALL.",
        ));
    }

    let config = client.config();
    let advertised: IpAddr = match &config.server.pasv_address {
        Some(address) => address.parse().map_err(|_| {
            CommandError::failed(ReplyCode::CANT_OPEN_DATA, "Invalid PASV address configured.")
        })?,
        None => client.control.local_addr().ip(),
    };
    let advertised = match advertised {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => {
            return Err(CommandError::failed(
                ReplyCode::CANT_OPEN_DATA,
                "PASV requires an IPv4 address; use EPSV.",
            ))
        }
    };

    let bind_ip = client.control.local_addr().ip();
    let range = (config.server.pasv_port_min, config.server.pasv_port_max);
    let port = match client.data.listen_passive(bind_ip, range).await {
        Ok(port) => port,
        Err(e) => {
            debug!("PASV listener setup failed: {}", e);
            return Err(CommandError::failed(
                ReplyCode::CANT_OPEN_DATA,
                "Can't open data connection.",
            ));
        }
    };

    let octets = advertised.octets();
    let message = format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    );
    client.reply(ReplyCode::PASSIVE_MODE, &message).await?;
    Ok(())
}
