use crate::core_counter::Counter;
use crate::core_fs::VirtualPath;
use crate::core_network::data::{Protection, TransferType};
use crate::core_ftpcommand::dirlist::{DirectoryList, ListOptions};
use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

/// Handles STAT.
///
/// Without an argument: a `211` status block for the session. With a path:
/// the listing travels inline on the control channel as a `213` multi-line
/// reply, no data connection involved.
pub async fn handle_stat_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();

    if arg_str.is_empty() {
        let cipher = client.control.cipher().unwrap_or_else(|| "NONE".to_string());
        let since = client
            .shared
            .logged_in_at()
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let transfer_type = match client.data.transfer_type() {
            TransferType::Ascii => "ASCII",
            TransferType::Binary => "BINARY",
        };
        let protection = match client.data.protection() {
            Protection::Clear => "Clear",
            Protection::Private => "Private",
        };
        let status = format!(
            "ferroftpd status:\nConnected from {}\nLogged in as {} since {}\n\
             Control cipher: {}\nType: {}, Protection: {}\n\
             Logged in users: {}\nActive uploads: {}, downloads: {}\n\
             End of status.",
            client.shared.hostname_and_ip(),
            user.name,
            since,
            cipher,
            transfer_type,
            protection,
            Counter::login().total(),
            Counter::uploads().active(),
            Counter::downloads().active(),
        );
        client.reply(ReplyCode::SYSTEM_STATUS, &status).await?;
        return Ok(());
    }

    let (mut options, path_part) = ListOptions::from_arg(&arg_str);
    options.long_format = true;
    let path = VirtualPath::from_user(&client.cwd, &path_part);

    let fs = client.fs(&config);
    let listing = DirectoryList::new(&fs, &user, &config, options)
        .build(&path)
        .await?;

    let mut text = format!("Status of {}:\n", path);
    for line in listing.lines() {
        let line = line.trim_end_matches('\r');
        text.push_str(line);
        text.push('\n');
    }
    text.push_str("End of status.");
    client.reply(ReplyCode::FILE_STATUS, &text).await?;
    Ok(())
}
