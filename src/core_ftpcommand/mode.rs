use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_mode_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if !args[0].eq_ignore_ascii_case("S") {
        return Err(CommandError::failed(
            ReplyCode::PARAMETER_NOT_IMPLEMENTED,
            "Only stream mode is supported.",
        ));
    }
    client
        .reply(ReplyCode::COMMAND_OKAY, "Mode set to S.")
        .await?;
    Ok(())
}
