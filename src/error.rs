use std::fmt;

/// Failures on the BLE link itself. A dropped connection is not retried
/// here; only the bounded response-read poll retries, and only on emptiness.
#[derive(Debug)]
pub enum TransportError {
    WriteFailed(String),
    NoResponse { attempts: u8 },
    LinkLost(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::WriteFailed(msg) => write!(f, "characteristic write failed: {msg}"),
            TransportError::NoResponse { attempts } => {
                write!(f, "no response after {attempts} read attempts")
            }
            TransportError::LinkLost(msg) => write!(f, "BLE link lost: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failures turning a device payload into a state record. Cipher failures
/// land here too: a wrong key or a corrupted blob must never surface as
/// half-parsed state.
#[derive(Debug)]
pub enum DecodeError {
    Malformed(String),
    UnknownZone(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(msg) => write!(f, "malformed payload: {msg}"),
            DecodeError::UnknownZone(zone) => write!(f, "zone {zone} missing from Z_sts"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A `Change` envelope with nothing to change is never sent.
#[derive(Debug)]
pub struct EmptyChangeError;

impl fmt::Display for EmptyChangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change request resolved to no recognized changes")
    }
}

impl std::error::Error for EmptyChangeError {}

/// Phase of the exchange state machine in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Authenticating,
    Sending,
    AwaitingResponse,
    Decoding,
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExchangePhase::Authenticating => "authenticating",
            ExchangePhase::Sending => "sending",
            ExchangePhase::AwaitingResponse => "awaiting response",
            ExchangePhase::Decoding => "decoding",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum ExchangeErrorKind {
    Transport(TransportError),
    Decode(DecodeError),
    EmptyChange,
}

/// One typed error per failed exchange. Carries the failing phase and the
/// number of response-read attempts consumed.
#[derive(Debug)]
pub struct ExchangeError {
    pub phase: ExchangePhase,
    pub kind: ExchangeErrorKind,
    pub attempts: u8,
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exchange failed while {}: ", self.phase)?;
        match &self.kind {
            ExchangeErrorKind::Transport(e) => write!(f, "{e}"),
            ExchangeErrorKind::Decode(e) => write!(f, "{e}"),
            ExchangeErrorKind::EmptyChange => write!(f, "{EmptyChangeError}"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ExchangeErrorKind::Transport(e) => Some(e),
            ExchangeErrorKind::Decode(e) => Some(e),
            ExchangeErrorKind::EmptyChange => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
