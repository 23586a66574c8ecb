use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_session::session::ClientState;

pub async fn handle_quit_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    client.reply(ReplyCode::CLOSING_CONTROL, "Goodbye.").await?;
    client.shared.set_state(ClientState::Finished);
    Ok(())
}
