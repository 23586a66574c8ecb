use crate::core_ftpcommand::error::CommandError;
use crate::core_network::data::TransferType;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles the TYPE command. ASCII and binary (image) are supported; the
/// historical EBCDIC and local-byte types are refused.
pub async fn handle_type_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    match args[0].to_uppercase().as_str() {
        "A" => {
            client.data.set_type(TransferType::Ascii);
            client.reply(ReplyCode::COMMAND_OKAY, "Type set to A.").await?;
        }
        "I" => {
            client.data.set_type(TransferType::Binary);
            client.reply(ReplyCode::COMMAND_OKAY, "Type set to I.").await?;
        }
        "L" if args.get(1).map(|s| s.as_str()) == Some("8") => {
            client.data.set_type(TransferType::Binary);
            client.reply(ReplyCode::COMMAND_OKAY, "Type set to L 8.").await?;
        }
        "E" | "L" => {
            return Err(CommandError::failed(
                ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                "Command not implemented for that parameter.",
            ))
        }
        _ => return Err(CommandError::Syntax),
    }
    Ok(())
}
