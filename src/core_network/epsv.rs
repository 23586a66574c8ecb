use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use log::debug;

/// Handles EPSV (RFC 2428): protocol-agnostic passive mode.
///
/// `EPSV ALL` commits the session to extended passive; later PORT/PASV/EPRT
/// are refused.
pub async fn handle_epsv_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if let Some(arg) = args.first() {
        if arg.eq_ignore_ascii_case("ALL") {
            client.epsv_all = true;
            client
                .reply(ReplyCode::COMMAND_OKAY, "EPSV ALL command successful.")
                .await?;
            return Ok(());
        }
        if arg.as_str() != "1" && arg.as_str() != "2" {
            return Err(CommandError::failed(
                ReplyCode::NETWORK_PROTOCOL_UNSUPPORTED,
                "Network protocol not supported, use (1,2)",
            ));
        }
    }

    let config = client.config();
    let bind_ip = client.control.local_addr().ip();
    let range = (config.server.pasv_port_min, config.server.pasv_port_max);
    let port = match client.data.listen_passive(bind_ip, range).await {
        Ok(port) => port,
        Err(e) => {
            debug!("EPSV listener setup failed: {}", e);
            return Err(CommandError::failed(
                ReplyCode::CANT_OPEN_DATA,
                "Can't open data connection.",
            ));
        }
    };

    client
        .reply(
            ReplyCode::EXTENDED_PASSIVE_MODE,
            &format!("Entering Extended Passive Mode (|||{}|)", port),
        )
        .await?;
    Ok(())
}
