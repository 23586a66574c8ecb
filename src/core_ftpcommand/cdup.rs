use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_cdup_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    client.cwd = client.cwd.parent();
    client
        .reply(ReplyCode::FILE_ACTION_OKAY, "CDUP command successful.")
        .await?;
    Ok(())
}
