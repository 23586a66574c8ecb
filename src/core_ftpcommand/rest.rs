use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles REST: records the restart offset for the next transfer command.
pub async fn handle_rest_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    let offset: u64 = args[0].parse().map_err(|_| CommandError::Syntax)?;
    client.rest_offset = offset;
    client
        .reply(
            ReplyCode::PENDING_FURTHER_INFO,
            &format!("Restarting at {}. Send STOR or RETR to resume.", offset),
        )
        .await?;
    Ok(())
}
