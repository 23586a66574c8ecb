use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_syst_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    client
        .reply(ReplyCode::SYSTEM_TYPE, "UNIX Type: L8")
        .await?;
    Ok(())
}
