use crate::core_fs::VirtualPath;
use crate::core_ftpcommand::dirlist::{DirectoryList, ListOptions};
use crate::core_ftpcommand::error::CommandError;
use crate::core_ftpcommand::transfer;
use crate::core_session::client::Client;

/// Handles NLST: a bare name list for mget-style clients.
pub async fn handle_nlst_command(
    client: &mut Client,
    arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let user = client.require_user()?;
    let config = client.config();

    let (mut options, path_part) = ListOptions::from_arg(&arg_str);
    options.long_format = false;
    let path = VirtualPath::from_user(&client.cwd, &path_part);

    let fs = client.fs(&config);
    let listing = DirectoryList::new(&fs, &user, &config, options)
        .build(&path)
        .await?;

    transfer::send_listing(client, listing).await
}
