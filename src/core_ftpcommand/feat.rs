use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;

pub async fn handle_feat_command(
    client: &mut Client,
    _arg_str: String,
    _args: Vec<String>,
) -> Result<(), CommandError> {
    let features = "Extensions supported:\n AUTH TLS\n PBSZ\n PROT\n CCC\n EPRT\n EPSV\n \
                    MDTM\n SIZE\n REST STREAM\n MLST type*;size*;modify*;\n MLSD\nEnd.";
    client.reply(ReplyCode::SYSTEM_STATUS, features).await?;
    Ok(())
}
