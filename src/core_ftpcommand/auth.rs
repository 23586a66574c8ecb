use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use log::info;

/// Handles the AUTH command: upgrades the control channel to TLS.
///
/// The reply is sent in clear; the handshake follows immediately after.
pub async fn handle_auth_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if !args[0].eq_ignore_ascii_case("TLS") {
        return Err(CommandError::failed(
            ReplyCode::PARAMETER_NOT_IMPLEMENTED,
            "Only AUTH TLS is supported.",
        ));
    }
    if client.control.is_tls() {
        return Err(CommandError::failed(
            ReplyCode::BAD_COMMAND_SEQUENCE,
            "Already using TLS.",
        ));
    }
    let tls = match client.tls.clone() {
        Some(tls) => tls,
        None => {
            return Err(CommandError::failed(
                ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                "TLS is not enabled.",
            ))
        }
    };

    client
        .reply(ReplyCode::AUTH_OKAY, "AUTH TLS successful.")
        .await?;
    client.control.upgrade_tls(tls.acceptor()).await?;
    info!(
        "Control channel upgraded to TLS for {}",
        client.shared.hostname_and_ip()
    );
    Ok(())
}
