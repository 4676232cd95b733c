pub mod cipher;
mod error;
mod logger;
pub mod message;
mod session;
pub mod status;
pub mod transport;
mod types;
pub mod zones;

pub use error::{
    DecodeError, EmptyChangeError, ExchangeError, ExchangeErrorKind, ExchangePhase, Result,
    TransportError,
};
pub use session::{Session, SessionBuilder, SessionState, backoff_seconds, open_session};
pub use transport::{BleLink, GattPeripheral, read_with_retry};
pub use types::*;
