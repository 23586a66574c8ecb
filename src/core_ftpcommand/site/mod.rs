//! SITE command dispatch: built-in operator commands plus the
//! operator-configured custom commands.

pub mod custom;
pub mod kick;
pub mod shutdown;
pub mod who;

use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_site_command(
    client: &mut Client,
    arg_str: String,
    args: Vec<String>,
) -> Result<(), CommandError> {
    let subcommand = args[0].to_uppercase();
    let rest = arg_str[args[0].len()..].trim().to_string();

    match subcommand.as_str() {
        "WHO" => who::handle_site_who(client).await,
        "KICK" => kick::handle_site_kick(client, &rest).await,
        "SHUTDOWN" => shutdown::handle_site_shutdown(client, &arg_str).await,
        _ => {
            let config = client.config();
            let custom = config
                .site_cmd
                .iter()
                .find(|cmd| cmd.name.eq_ignore_ascii_case(&subcommand))
                .cloned();
            match custom {
                Some(cmd) => custom::handle_custom_command(client, &cmd, &rest).await,
                None => Err(CommandError::failed(
                    ReplyCode::COMMAND_UNRECOGNISED,
                    format!("SITE {} command not understood.", subcommand),
                )),
            }
        }
    }
}
