//! Shared plumbing for the transfer commands.

use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_speed::SpeedControl;

pub fn upload_buffer_size(client: &Client) -> usize {
    client
        .config()
        .server
        .upload_buffer_size
        .unwrap_or(DEFAULT_BUFFER_SIZE)
}

pub fn download_buffer_size(client: &Client) -> usize {
    client
        .config()
        .server
        .download_buffer_size
        .unwrap_or(DEFAULT_BUFFER_SIZE)
}

/// Streams an assembled listing over the data channel with the usual
/// `150` / `226` bracketing. Listings are not shaped or counted as
/// transfers.
pub async fn send_listing(client: &mut Client, payload: String) -> Result<(), CommandError> {
    client
        .reply(
            ReplyCode::DATA_OPEN,
            "Opening connection for directory listing.",
        )
        .await?;
    client.open_data().await?;

    let mut speed = SpeedControl::unlimited();
    let mut cursor = std::io::Cursor::new(payload.into_bytes());
    let buffer_size = download_buffer_size(client);
    let outcome = client.pump_send(&mut cursor, &mut speed, buffer_size).await?;
    client.end_transfer(outcome).await?;
    Ok(())
}
