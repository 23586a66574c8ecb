//! FTP verb dispatch: the command registry and one handler module per verb.

pub mod abor;
pub mod acct;
pub mod appe;
pub mod auth;
pub mod ccc;
pub mod cdup;
pub mod cwd;
pub mod dele;
pub mod dirlist;
pub mod error;
pub mod feat;
pub mod help;
pub mod idnt;
pub mod list;
pub mod mdtm;
pub mod mkd;
pub mod mlst;
pub mod mode;
pub mod nlst;
pub mod noop;
pub mod opts;
pub mod pass;
pub mod pbsz;
pub mod prot;
pub mod pwd;
pub mod quit;
pub mod rein;
pub mod rest;
pub mod retr;
pub mod rmd;
pub mod rnfr;
pub mod rnto;
pub mod site;
pub mod size;
pub mod stat;
pub mod stor;
pub mod stru;
pub mod syst;
pub mod transfer;
pub mod type_;
pub mod user;

use crate::core_ftpcommand::error::CommandError;
use crate::core_network::reply::ReplyCode;
use crate::core_session::client::Client;
use crate::core_session::session::RequiredState;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'a>>;
pub type HandlerFn = for<'a> fn(&'a mut Client, String, Vec<String>) -> HandlerFuture<'a>;

/// Everything dispatch needs to know about one verb.
pub struct CommandDef {
    pub name: &'static str,
    pub syntax: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub required_state: RequiredState,
    pub fail_code: ReplyCode,
    pub handler: HandlerFn,
}

impl CommandDef {
    pub fn check_args(&self, operands: usize) -> bool {
        operands >= self.min_args && operands <= self.max_args
    }
}

macro_rules! handler {
    ($f:path) => {{
        fn wrap<'a>(
            client: &'a mut Client,
            arg_str: String,
            args: Vec<String>,
        ) -> HandlerFuture<'a> {
            Box::pin($f(client, arg_str, args))
        }
        wrap as HandlerFn
    }};
}

const MANY: usize = usize::MAX;

static REGISTRY: Lazy<HashMap<&'static str, CommandDef>> = Lazy::new(|| {
    use RequiredState::*;

    let mut map = HashMap::new();
    let mut def = |name: &'static str,
                   syntax: &'static str,
                   min_args: usize,
                   max_args: usize,
                   required_state: RequiredState,
                   fail_code: u16,
                   handler: HandlerFn| {
        map.insert(
            name,
            CommandDef {
                name,
                syntax,
                min_args,
                max_args,
                required_state,
                fail_code: ReplyCode(fail_code),
                handler,
            },
        );
    };

    def("ABOR", "ABOR", 0, 0, LoggedIn, 500, handler!(abor::handle_abor_command));
    def("ACCT", "ACCT <info>", 1, 1, LoggedIn, 502, handler!(acct::handle_acct_command));
    def("APPE", "APPE <path>", 1, MANY, LoggedIn, 550, handler!(appe::handle_appe_command));
    def("AUTH", "AUTH <TLS>", 1, 1, LoggedOut, 504, handler!(auth::handle_auth_command));
    def("CCC", "CCC", 0, 0, NotBeforeAuth, 503, handler!(ccc::handle_ccc_command));
    def("CDUP", "CDUP", 0, 0, LoggedIn, 550, handler!(cdup::handle_cdup_command));
    def("CWD", "CWD <path>", 1, MANY, LoggedIn, 550, handler!(cwd::handle_cwd_command));
    def("DELE", "DELE <path>", 1, MANY, LoggedIn, 550, handler!(dele::handle_dele_command));
    def("EPRT", "EPRT |<proto>|<addr>|<port>|", 1, 1, LoggedIn, 500,
        handler!(crate::core_network::eprt::handle_eprt_command));
    def("EPSV", "EPSV [<proto>]", 0, 1, LoggedIn, 425,
        handler!(crate::core_network::epsv::handle_epsv_command));
    def("FEAT", "FEAT", 0, 0, AnyState, 500, handler!(feat::handle_feat_command));
    def("HELP", "HELP [<command>]", 0, 1, AnyState, 500, handler!(help::handle_help_command));
    def("IDNT", "IDNT <ident>@<ip>:<hostname>", 1, 1, LoggedOut, 500,
        handler!(idnt::handle_idnt_command));
    def("LIST", "LIST [-<options>] [<path>]", 0, MANY, LoggedIn, 450,
        handler!(list::handle_list_command));
    def("MDTM", "MDTM <path>", 1, MANY, LoggedIn, 550, handler!(mdtm::handle_mdtm_command));
    def("MKD", "MKD <path>", 1, MANY, LoggedIn, 550, handler!(mkd::handle_mkd_command));
    def("MLSD", "MLSD [<path>]", 0, MANY, LoggedIn, 550, handler!(mlst::handle_mlsd_command));
    def("MLST", "MLST [<path>]", 0, MANY, LoggedIn, 550, handler!(mlst::handle_mlst_command));
    def("MODE", "MODE <S>", 1, 1, LoggedIn, 504, handler!(mode::handle_mode_command));
    def("NLST", "NLST [-<options>] [<path>]", 0, MANY, LoggedIn, 450,
        handler!(nlst::handle_nlst_command));
    def("NOOP", "NOOP", 0, 0, LoggedIn, 500, handler!(noop::handle_noop_command));
    def("OPTS", "OPTS <option> [<value>]", 1, 2, LoggedIn, 501, handler!(opts::handle_opts_command));
    def("PASS", "PASS <password>", 1, 1, WaitingPassword, 530, handler!(pass::handle_pass_command));
    def("PASV", "PASV", 0, 0, LoggedIn, 425,
        handler!(crate::core_network::pasv::handle_pasv_command));
    def("PBSZ", "PBSZ <size>", 1, 1, NotBeforeAuth, 503, handler!(pbsz::handle_pbsz_command));
    def("PORT", "PORT <h1,h2,h3,h4,p1,p2>", 1, 1, LoggedIn, 500,
        handler!(crate::core_network::port::handle_port_command));
    def("PROT", "PROT <C|P>", 1, 1, NotBeforeAuth, 503, handler!(prot::handle_prot_command));
    def("PWD", "PWD", 0, 0, LoggedIn, 550, handler!(pwd::handle_pwd_command));
    def("QUIT", "QUIT", 0, 0, AnyState, 500, handler!(quit::handle_quit_command));
    def("REIN", "REIN", 0, 0, LoggedIn, 500, handler!(rein::handle_rein_command));
    def("REST", "REST <offset>", 1, 1, LoggedIn, 501, handler!(rest::handle_rest_command));
    def("RETR", "RETR <path>", 1, MANY, LoggedIn, 550, handler!(retr::handle_retr_command));
    def("RMD", "RMD <path>", 1, MANY, LoggedIn, 550, handler!(rmd::handle_rmd_command));
    def("RNFR", "RNFR <path>", 1, MANY, LoggedIn, 550, handler!(rnfr::handle_rnfr_command));
    def("RNTO", "RNTO <path>", 1, MANY, LoggedIn, 550, handler!(rnto::handle_rnto_command));
    def("SITE", "SITE <command> [<args>]", 1, MANY, LoggedIn, 500,
        handler!(site::handle_site_command));
    def("SIZE", "SIZE <path>", 1, MANY, LoggedIn, 550, handler!(size::handle_size_command));
    def("STAT", "STAT [<path>]", 0, MANY, LoggedIn, 450, handler!(stat::handle_stat_command));
    def("STOR", "STOR <path>", 1, MANY, LoggedIn, 550, handler!(stor::handle_stor_command));
    def("STRU", "STRU <F>", 1, 1, LoggedIn, 504, handler!(stru::handle_stru_command));
    def("SYST", "SYST", 0, 0, LoggedIn, 500, handler!(syst::handle_syst_command));
    def("TYPE", "TYPE <A|I> [<param>]", 1, 2, LoggedIn, 504, handler!(type_::handle_type_command));
    def("USER", "USER <name>", 1, 1, LoggedOut, 530, handler!(user::handle_user_command));

    map
});

/// Looks up a verb's descriptor. Verbs are stored uppercase.
pub fn lookup(verb: &str) -> Option<&'static CommandDef> {
    REGISTRY.get(verb)
}

/// Sorted verb list for HELP.
pub fn verbs() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_exact_uppercase() {
        assert!(lookup("RETR").is_some());
        assert!(lookup("retr").is_none());
        assert!(lookup("NOSUCH").is_none());
    }

    #[test]
    fn arg_bounds() {
        let user = lookup("USER").unwrap();
        assert!(!user.check_args(0));
        assert!(user.check_args(1));
        assert!(!user.check_args(2));

        let list = lookup("LIST").unwrap();
        assert!(list.check_args(0));
        assert!(list.check_args(5));
    }

    #[test]
    fn state_requirements_match_the_table() {
        assert_eq!(lookup("USER").unwrap().required_state, RequiredState::LoggedOut);
        assert_eq!(lookup("PASS").unwrap().required_state, RequiredState::WaitingPassword);
        assert_eq!(lookup("PROT").unwrap().required_state, RequiredState::NotBeforeAuth);
        assert_eq!(lookup("QUIT").unwrap().required_state, RequiredState::AnyState);
        assert_eq!(lookup("STOR").unwrap().required_state, RequiredState::LoggedIn);
    }

    #[test]
    fn every_verb_of_the_wire_protocol_is_registered() {
        for verb in [
            "USER", "PASS", "ACCT", "QUIT", "REIN", "TYPE", "STRU", "MODE", "PORT", "PASV",
            "EPRT", "EPSV", "LIST", "NLST", "STOR", "RETR", "APPE", "REST", "RNFR", "RNTO",
            "DELE", "RMD", "MKD", "PWD", "CWD", "CDUP", "SITE", "SYST", "STAT", "HELP", "NOOP",
            "FEAT", "OPTS", "AUTH", "PBSZ", "PROT", "CCC", "ABOR", "MDTM", "SIZE", "MLST",
            "MLSD", "IDNT",
        ] {
            assert!(lookup(verb).is_some(), "{} missing from registry", verb);
        }
    }
}
