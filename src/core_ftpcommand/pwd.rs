use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_pwd_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let message = format!("\"{}\" is current directory.", client.cwd);
    client.reply(ReplyCode::PATH_CREATED, &message).await?;
    Ok(())
}
