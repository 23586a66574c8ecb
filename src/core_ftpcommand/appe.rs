use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::stor;
use crate::core_session::client::Client;

/// Handles APPE: a store that appends instead of truncating.
pub async fn handle_appe_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    stor::store_file(client, arg_str, true).await
}
