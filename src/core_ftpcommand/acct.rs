use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_acct_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    client
        .reply(ReplyCode::SUPERFLUOUS, "ACCT command superfluous.")
        .await?;
    Ok(())
}
