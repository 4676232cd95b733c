//! Per-device session: one logical exchange (authenticate, send, await,
//! decode) at a time, with consecutive-failure counting and backoff.
//!
//! Exchanges are strictly sequential for one device; the `&mut self`
//! receivers enforce that at compile time. Sessions for different
//! peripherals share no state and may run concurrently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{
    DecodeError, ExchangeError, ExchangeErrorKind, ExchangePhase, Result, TransportError,
};
use crate::logger::MessageLogger;
use crate::transport::{
    COMMAND_UUID, GattPeripheral, INFO_UUID, PASSWORD_UUID, RESPONSE_UUID, read_with_retry,
};
use crate::types::{ChangeSet, Credentials, DeviceStateRecord, ZoneDiscovery};
use crate::{cipher, message, status, zones};

const DEFAULT_READ_ATTEMPTS: u8 = 10;
const DEFAULT_READ_DELAY: Duration = Duration::from_millis(500);

const BACKOFF_BASE_SECS: i64 = 120;
const BACKOFF_CAP_SECS: i64 = 900;
const UNAVAILABLE_AFTER_FAILURES: u32 = 3;

/// Mutable per-device availability tracking. Updated exactly once per
/// exchange: reset on success, bumped on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub consecutive_failures: u32,
    pub available: bool,
    pub backoff_until: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            available: true,
            backoff_until: None,
        }
    }
}

impl SessionState {
    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.available = true;
        self.backoff_until = None;
    }

    fn record_failure(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        self.available = self.consecutive_failures < UNAVAILABLE_AFTER_FAILURES;
        let secs = backoff_seconds(self.consecutive_failures);
        self.backoff_until = Some(now + chrono::Duration::seconds(secs));
    }
}

/// Backoff after the nth consecutive failure: 120s, 240s, 480s, capped at
/// 900s from the fourth failure on.
pub fn backoff_seconds(failures: u32) -> i64 {
    let exponent = failures.saturating_sub(1).min(3);
    (BACKOFF_BASE_SECS << exponent).min(BACKOFF_CAP_SECS)
}

pub struct SessionBuilder<L: GattPeripheral> {
    link: L,
    credentials: Credentials,
    max_read_attempts: u8,
    read_delay: Duration,
    authenticate_each_exchange: bool,
    log_path: Option<String>,
}

impl<L: GattPeripheral> SessionBuilder<L> {
    pub fn new(link: L, credentials: Credentials) -> Self {
        Self {
            link,
            credentials,
            max_read_attempts: DEFAULT_READ_ATTEMPTS,
            read_delay: DEFAULT_READ_DELAY,
            authenticate_each_exchange: true,
            log_path: None,
        }
    }

    pub fn max_read_attempts(mut self, attempts: u8) -> Self {
        self.max_read_attempts = attempts;
        self
    }

    pub fn read_retry_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Whether to rewrite the password characteristic on every exchange.
    /// On by default; firmware behaviour across reconnects is not
    /// documented, and a redundant write is harmless.
    pub fn authenticate_each_exchange(mut self, enabled: bool) -> Self {
        self.authenticate_each_exchange = enabled;
        self
    }

    pub fn message_log(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Session<L> {
        let logger = self
            .log_path
            .map(|path| MessageLogger::new(&path).expect("failed to open log file"));

        Session {
            link: self.link,
            credentials: self.credentials,
            max_read_attempts: self.max_read_attempts,
            read_delay: self.read_delay,
            authenticate_each_exchange: self.authenticate_each_exchange,
            state: SessionState::default(),
            logger,
        }
    }
}

/// Open a session over an already-connected peripheral with default tuning.
pub fn open_session<L: GattPeripheral>(link: L, credentials: Credentials) -> Session<L> {
    SessionBuilder::new(link, credentials).build()
}

pub struct Session<L: GattPeripheral> {
    link: L,
    credentials: Credentials,
    max_read_attempts: u8,
    read_delay: Duration,
    authenticate_each_exchange: bool,
    state: SessionState,
    logger: Option<MessageLogger>,
}

impl<L: GattPeripheral> Session<L> {
    pub fn builder(link: L, credentials: Credentials) -> SessionBuilder<L> {
        SessionBuilder::new(link, credentials)
    }

    /// Query the device status for one zone.
    pub async fn get_status(
        &mut self,
        zone: u8,
        now: DateTime<Utc>,
    ) -> Result<DeviceStateRecord> {
        let envelope = message::get_status(zone, &self.credentials, now);
        self.exchange("get_status", zone, envelope, now).await
    }

    /// Apply a set of field changes to one zone. Rejected before anything
    /// touches the radio if the change set is empty; that rejection does
    /// not count as a device failure.
    pub async fn change(
        &mut self,
        zone: u8,
        changes: &ChangeSet,
        now: DateTime<Utc>,
    ) -> Result<DeviceStateRecord> {
        let envelope = message::change(zone, changes).map_err(|_| {
            warn!(zone, "rejecting change request with no recognized changes");
            ExchangeError {
                phase: ExchangePhase::Sending,
                kind: ExchangeErrorKind::EmptyChange,
                attempts: 0,
            }
        })?;
        self.exchange("change", zone, envelope, now).await
    }

    /// Push the controller's location to the device.
    pub async fn set_location(
        &mut self,
        zone: u8,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<DeviceStateRecord> {
        let envelope = message::set_location(zone, latitude, longitude, now);
        self.exchange("set_location", zone, envelope, now).await
    }

    /// Probe zone 0 and derive the available zone set from the response.
    /// Non-fatal: any failure falls back to the single default zone (the
    /// failed probe still counts against availability like any exchange).
    pub async fn discover_zones(&mut self, now: DateTime<Utc>) -> ZoneDiscovery {
        match self.get_status(0, now).await {
            Ok(record) => zones::discover(&record),
            Err(e) => {
                warn!(error = %e, "zone discovery probe failed, falling back to zone 0");
                ZoneDiscovery::Fallback(vec![0])
            }
        }
    }

    /// Opportunistic read of the informational characteristic. Failures are
    /// logged and swallowed; nothing in the protocol depends on it.
    pub async fn read_device_info(&mut self) -> Option<Vec<u8>> {
        match self.link.read_characteristic(INFO_UUID).await {
            Ok(payload) if !payload.is_empty() => Some(payload),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "informational characteristic read failed");
                None
            }
        }
    }

    /// True while the device is inside its backoff window; callers should
    /// skip polling instead of attempting a doomed exchange.
    pub fn is_backing_off(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state.backoff_until, Some(until) if now < until)
    }

    pub fn availability(&self) -> bool {
        self.state.available
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    async fn exchange(
        &mut self,
        action: &str,
        zone: u8,
        envelope: Value,
        now: DateTime<Utc>,
    ) -> Result<DeviceStateRecord> {
        if self.is_backing_off(now) {
            // the exchange still runs; gating on is_backing_off is the
            // caller's contract, not enforced here
            debug!(action, zone, "exchange requested inside backoff window");
        } else if let Some(until) = self.state.backoff_until
            && now >= until
        {
            self.state.backoff_until = None;
        }

        if let Some(ref mut logger) = self.logger {
            logger.log_command(action, zone, &envelope);
        }

        match self.run_exchange(zone, &envelope).await {
            Ok(record) => {
                self.state.record_success();
                debug!(action, zone, "exchange succeeded");
                Ok(record)
            }
            Err(err) => {
                self.state.record_failure(now);
                if let Some(ref mut logger) = self.logger {
                    logger.log_failure(action, zone, &err.phase.to_string(), &err.to_string(), err.attempts);
                }
                warn!(
                    action,
                    zone,
                    consecutive_failures = self.state.consecutive_failures,
                    available = self.state.available,
                    error = %err,
                    "exchange failed"
                );
                Err(err)
            }
        }
    }

    async fn run_exchange(&mut self, zone: u8, envelope: &Value) -> Result<DeviceStateRecord> {
        if self.authenticate_each_exchange
            && let Some(password) = self.credentials.password.clone()
        {
            self.link
                .write_characteristic(PASSWORD_UUID, password.as_bytes())
                .await
                .map_err(|e| fail(ExchangePhase::Authenticating, e, 0))?;
        }

        let plaintext = serde_json::to_vec(envelope).map_err(|e| ExchangeError {
            phase: ExchangePhase::Sending,
            kind: ExchangeErrorKind::Decode(DecodeError::Malformed(e.to_string())),
            attempts: 0,
        })?;
        let sealed = cipher::encrypt(&plaintext, &self.credentials);
        self.link
            .write_characteristic(COMMAND_UUID, &sealed)
            .await
            .map_err(|e| fail(ExchangePhase::Sending, e, 0))?;

        let payload = read_with_retry(
            &self.link,
            RESPONSE_UUID,
            self.max_read_attempts,
            self.read_delay,
        )
        .await
        .map_err(|e| {
            let attempts = match &e {
                TransportError::NoResponse { attempts } => *attempts,
                _ => 0,
            };
            fail(ExchangePhase::AwaitingResponse, e, attempts)
        })?;

        let plaintext = cipher::decrypt(&payload, &self.credentials).map_err(|e| ExchangeError {
            phase: ExchangePhase::Decoding,
            kind: ExchangeErrorKind::Decode(e),
            attempts: 0,
        })?;

        if let Some(ref mut logger) = self.logger {
            logger.log_response(zone, &plaintext);
        }

        status::decode(&plaintext, zone).map_err(|e| ExchangeError {
            phase: ExchangePhase::Decoding,
            kind: ExchangeErrorKind::Decode(e),
            attempts: 0,
        })
    }
}

fn fail(phase: ExchangePhase, error: TransportError, attempts: u8) -> ExchangeError {
    ExchangeError {
        phase,
        kind: ExchangeErrorKind::Transport(error),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn backoff_schedule_doubles_then_caps() {
        assert_eq!(backoff_seconds(1), 120);
        assert_eq!(backoff_seconds(2), 240);
        assert_eq!(backoff_seconds(3), 480);
        assert_eq!(backoff_seconds(4), 900);
        assert_eq!(backoff_seconds(50), 900);
    }

    #[test]
    fn availability_flips_at_third_failure() {
        let mut state = SessionState::default();
        state.record_failure(at(0));
        assert!(state.available);
        state.record_failure(at(0));
        assert!(state.available);
        state.record_failure(at(0));
        assert!(!state.available);
        assert_eq!(state.consecutive_failures, 3);
    }

    #[test]
    fn success_resets_state() {
        let mut state = SessionState::default();
        for _ in 0..4 {
            state.record_failure(at(0));
        }
        assert!(!state.available);

        state.record_success();
        assert!(state.available);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.backoff_until, None);
    }

    #[test]
    fn backoff_until_tracks_schedule() {
        let mut state = SessionState::default();
        state.record_failure(at(0));
        assert_eq!(state.backoff_until, Some(at(120)));
        state.record_failure(at(120));
        assert_eq!(state.backoff_until, Some(at(120 + 240)));
    }
}
