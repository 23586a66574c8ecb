pub mod control;
pub mod data;
pub mod eprt;
pub mod epsv;
pub mod error;
pub mod ident;
pub mod interrupt;
pub mod pasv;
pub mod port;
pub mod reply;
pub mod resolver;
pub mod socket;
pub mod tls;

pub use control::ControlChannel;
pub use data::{DataChannel, Protection, TransferType};
pub use error::NetworkError;
pub use interrupt::Interrupter;
pub use reply::ReplyCode;
pub use socket::Socket;
pub use tls::TlsContext;
