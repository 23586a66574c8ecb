use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles PBSZ. TLS ignores the buffer size; only 0 is meaningful.
pub async fn handle_pbsz_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if args[0].parse::<u64>().is_err() {
        return Err(CommandError::Syntax);
    }
    client.reply(ReplyCode::COMMAND_OKAY, "PBSZ=0").await?;
    Ok(())
}
