use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_session::session::ClientState;

/// Handles REIN: drops the login and returns the session to its fresh state.
pub async fn handle_rein_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    client.shared.set_state(ClientState::LoggedOut);
    client.cwd = VirtualPath::root();
    client.rename_from = None;
    client.rest_offset = 0;
    client.data.close().await;
    client
        .reply(ReplyCode::SERVICE_READY, "Service ready for new user.")
        .await?;
    Ok(())
}
