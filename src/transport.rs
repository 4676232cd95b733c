//! GATT transport against the EasyTouch's fixed vendor characteristics.
//!
//! The device buffers its JSON response asynchronously after a command
//! write, so an immediate read of the response characteristic commonly
//! comes back empty; [`read_with_retry`] polls it with a bounded number of
//! attempts. Retries never span a reconnect: a dropped link surfaces as
//! [`TransportError::LinkLost`] and recovery is the caller's problem.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tracing::trace;
use uuid::{Uuid, uuid};

use crate::error::TransportError;

/// Vendor service exposing the thermostat protocol.
pub const SERVICE_UUID: Uuid = uuid!("000000ff-0000-1000-8000-00805f9b34fb");
/// Password characteristic, written during the authentication handshake.
pub const PASSWORD_UUID: Uuid = uuid!("0000dd01-0000-1000-8000-00805f9b34fb");
/// Command characteristic, target of encrypted JSON envelopes.
pub const COMMAND_UUID: Uuid = uuid!("0000ee01-0000-1000-8000-00805f9b34fb");
/// Response characteristic, polled after a command write.
pub const RESPONSE_UUID: Uuid = uuid!("0000ff01-0000-1000-8000-00805f9b34fb");
/// Standard BLE characteristic read opportunistically for device info.
pub const INFO_UUID: Uuid = uuid!("00002a05-0000-1000-8000-00805f9b34fb");

/// Minimal view of an already-connected BLE peripheral. The session layer
/// talks only through this trait, which keeps exchanges testable against an
/// in-memory device.
#[async_trait]
pub trait GattPeripheral: Send + Sync {
    async fn write_characteristic(
        &self,
        uuid: Uuid,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>, TransportError>;
}

/// Poll a characteristic until it yields a non-empty payload, sleeping
/// `attempt_delay` between reads. Exhausting `max_attempts` yields
/// [`TransportError::NoResponse`]; read errors propagate immediately.
pub async fn read_with_retry<L: GattPeripheral + ?Sized>(
    link: &L,
    uuid: Uuid,
    max_attempts: u8,
    attempt_delay: Duration,
) -> Result<Vec<u8>, TransportError> {
    for attempt in 1..=max_attempts {
        let payload = link.read_characteristic(uuid).await?;
        if !payload.is_empty() {
            trace!(attempt, len = payload.len(), "response payload ready");
            return Ok(payload);
        }
        trace!(attempt, max_attempts, "response characteristic empty");
        if attempt < max_attempts {
            tokio::time::sleep(attempt_delay).await;
        }
    }
    Err(TransportError::NoResponse {
        attempts: max_attempts,
    })
}

/// Production [`GattPeripheral`] over a connected `btleplug` peripheral.
/// The handle must already be connected with services discovered; this
/// adapter never initiates connection management.
pub struct BleLink {
    peripheral: Peripheral,
}

impl BleLink {
    pub fn new(peripheral: Peripheral) -> Self {
        Self { peripheral }
    }

    fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| {
                // missing characteristic means services were never discovered
                // or the link dropped mid-session
                TransportError::LinkLost(format!("characteristic {uuid} not found"))
            })
    }
}

fn map_write_error(e: btleplug::Error) -> TransportError {
    match e {
        btleplug::Error::NotConnected | btleplug::Error::DeviceNotFound => {
            TransportError::LinkLost(e.to_string())
        }
        other => TransportError::WriteFailed(other.to_string()),
    }
}

#[async_trait]
impl GattPeripheral for BleLink {
    async fn write_characteristic(
        &self,
        uuid: Uuid,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await
            .map_err(map_write_error)
    }

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.find_characteristic(uuid)?;
        self.peripheral
            .read(&characteristic)
            .await
            .map_err(|e| TransportError::LinkLost(e.to_string()))
    }
}
