use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles ABOR arriving between transfers: discards any configured or
/// half-open data endpoint. An ABOR during a transfer never reaches this
/// handler; the transfer's control listener consumes it.
pub async fn handle_abor_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    client.data.close().await;
    client
        .reply(ReplyCode::TRANSFER_COMPLETE, "ABOR command successful.")
        .await?;
    Ok(())
}
