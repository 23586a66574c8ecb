pub mod client;
pub mod session;

pub use client::Client;
pub use session::{ClientState, RequiredState, SessionId, SessionShared};
