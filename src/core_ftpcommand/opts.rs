use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_opts_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    match args[0].to_uppercase().as_str() {
        "UTF8" => {
            client
                .reply(ReplyCode::COMMAND_OKAY, "UTF8 set to on.")
                .await?;
        }
        "MLST" => {
            client
                .reply(ReplyCode::COMMAND_OKAY, "MLST OPTS type;size;modify;")
                .await?;
        }
        _ => {
            return Err(CommandError::failed(
                ReplyCode::SYNTAX_ERROR,
                "Option not understood.",
            ))
        }
    }
    Ok(())
}
