use crate::core_ftpcommand::{self, error::CommandError};
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles HELP: the supported verb list, or one verb's syntax line.
pub async fn handle_help_command(
    client: &mut Client,
    _arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    if let Some(verb) = args.first() {
        let verb = verb.to_uppercase();
        return match core_ftpcommand::lookup(&verb) {
            Some(def) => {
                client
                    .reply(ReplyCode::HELP_MESSAGE, &format!("Syntax: {}", def.syntax))
                    .await?;
                Ok(())
            }
            None => Err(CommandError::failed(
                ReplyCode::SYNTAX_ERROR,
                format!("Unknown command {}.", verb),
            )),
        };
    }

    let mut text = String::from("The following commands are recognized:\n");
    for chunk in core_ftpcommand::verbs().chunks(8) {
        text.push(' ');
        text.push_str(&chunk.join(" "));
        text.push('\n');
    }
    text.push_str("Help okay.");
    client.reply(ReplyCode::HELP_MESSAGE, &text).await?;
    Ok(())
}
