use crate::core_ftpcommand::error::CommandError;
use crate::core_network::data::Protection;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles PROT: data channel protection, independent of the control wrap.
pub async fn handle_prot_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    match args[0].to_uppercase().as_str() {
        "C" => {
            client.data.set_protection(Protection::Clear);
            client
                .reply(ReplyCode::COMMAND_OKAY, "Protection set to Clear.")
                .await?;
        }
        "P" => {
            client.data.set_protection(Protection::Private);
            client
                .reply(ReplyCode::COMMAND_OKAY, "Protection set to Private.")
                .await?;
        }
        "S" | "E" => {
            return Err(CommandError::failed(
                ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                "Only C and P protection levels are supported.",
            ))
        }
        _ => return Err(CommandError::Syntax),
    }
    Ok(())
}
