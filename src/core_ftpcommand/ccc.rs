use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use log::info;

/// Handles CCC: strips TLS from the control channel, subject to config.
pub async fn handle_ccc_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let config = client.config();
    if !config.server.allow_ccc {
        return Err(CommandError::failed(
            ReplyCode::NOT_LOGGED_IN,
            "CCC is disabled.",
        ));
    }
    client
        .reply(ReplyCode::COMMAND_OKAY, "CCC command successful.")
        .await?;
    client.control.strip_tls()?;
    info!(
        "Control channel returned to clear for {}",
        client.shared.hostname_and_ip()
    );
    Ok(())
}
