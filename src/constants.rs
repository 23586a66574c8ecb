// src/constants.rs

/// PASS attempts allowed per USER before the session is cut loose.
pub const MAX_PASSWORD_ATTEMPTS: u32 = 3;

/// Budget for the whole RFC 1413 ident exchange.
pub const IDENT_TIMEOUT_SECS: u64 = 15;

/// How long a bouncer gets to send its IDNT preamble.
pub const IDNT_WAIT_SECS: u64 = 10;

/// Continuous under-run window before a transfer is kicked for low speed.
pub const MINIMUM_SPEED_KICK_SECS: u64 = 5;

/// Connect/accept budget for data connections.
pub const DATA_OPEN_TIMEOUT_SECS: u64 = 30;

/// Transfer buffer size when the config leaves it unset.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Attempts at binding a passive port before giving up with 425.
pub const PASV_BIND_ATTEMPTS: u32 = 10;

/// Recursion bound for LIST -R.
pub const LIST_MAX_RECURSION: usize = 3;

/// Grace given to a cscript child between SIGTERM and SIGKILL.
pub const CHILD_SHUTDOWN_TIMEOUT_SECS: u64 = 1;
