//! Three-digit FTP reply codes.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(pub u16);

impl ReplyCode {
    pub const DATA_OPEN: ReplyCode = ReplyCode(150);
    pub const COMMAND_OKAY: ReplyCode = ReplyCode(200);
    pub const SUPERFLUOUS: ReplyCode = ReplyCode(202);
    pub const SYSTEM_STATUS: ReplyCode = ReplyCode(211);
    pub const DIRECTORY_STATUS: ReplyCode = ReplyCode(212);
    pub const FILE_STATUS: ReplyCode = ReplyCode(213);
    pub const HELP_MESSAGE: ReplyCode = ReplyCode(214);
    pub const SYSTEM_TYPE: ReplyCode = ReplyCode(215);
    pub const SERVICE_READY: ReplyCode = ReplyCode(220);
    pub const CLOSING_CONTROL: ReplyCode = ReplyCode(221);
    pub const TRANSFER_COMPLETE: ReplyCode = ReplyCode(226);
    pub const PASSIVE_MODE: ReplyCode = ReplyCode(227);
    pub const EXTENDED_PASSIVE_MODE: ReplyCode = ReplyCode(229);
    pub const USER_LOGGED_IN: ReplyCode = ReplyCode(230);
    pub const AUTH_OKAY: ReplyCode = ReplyCode(234);
    pub const FILE_ACTION_OKAY: ReplyCode = ReplyCode(250);
    pub const PATH_CREATED: ReplyCode = ReplyCode(257);
    pub const NEED_PASSWORD: ReplyCode = ReplyCode(331);
    pub const PENDING_FURTHER_INFO: ReplyCode = ReplyCode(350);
    pub const SERVICE_UNAVAILABLE: ReplyCode = ReplyCode(421);
    pub const CANT_OPEN_DATA: ReplyCode = ReplyCode(425);
    pub const TRANSFER_ABORTED: ReplyCode = ReplyCode(426);
    pub const FILE_ACTION_NOT_TAKEN: ReplyCode = ReplyCode(450);
    pub const LOCAL_ERROR: ReplyCode = ReplyCode(451);
    pub const COMMAND_UNRECOGNISED: ReplyCode = ReplyCode(500);
    pub const SYNTAX_ERROR: ReplyCode = ReplyCode(501);
    pub const NOT_IMPLEMENTED: ReplyCode = ReplyCode(502);
    pub const BAD_COMMAND_SEQUENCE: ReplyCode = ReplyCode(503);
    pub const PARAMETER_NOT_IMPLEMENTED: ReplyCode = ReplyCode(504);
    pub const NETWORK_PROTOCOL_UNSUPPORTED: ReplyCode = ReplyCode(522);
    pub const NOT_LOGGED_IN: ReplyCode = ReplyCode(530);
    pub const ACTION_NOT_OKAY: ReplyCode = ReplyCode(550);
    pub const STORAGE_EXCEEDED: ReplyCode = ReplyCode(552);
    pub const NAME_NOT_ALLOWED: ReplyCode = ReplyCode(553);
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
