use crate::core_ftpcommand::error::CommandError;
use crate::core_log;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles the nonstandard IDNT preamble from a bouncer.
///
/// Only addresses on the bouncer list may rewrite the session's identity.
/// A successful update sends no reply, per the bouncer protocol.
pub async fn handle_idnt_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let config = client.config();
    if !config.is_bouncer(&client.shared.ip()) {
        core_log::security(
            "BADIDNT",
            &format!(
                "IDNT command from non-bouncer address: {}",
                client.shared.hostname_and_ip()
            ),
        );
        return Err(CommandError::failed(
            ReplyCode::COMMAND_UNRECOGNISED,
            "Command not understood",
        ));
    }
    if !client.idnt_parse(&format!("IDNT {}", arg_str)) {
        return Err(CommandError::Syntax);
    }
    Ok(())
}
