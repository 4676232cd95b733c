//! Decoder for the device's decrypted JSON status response.
//!
//! The interesting data lives in `Z_sts[zone]`, a position-encoded array the
//! firmware grows over time. Documented offsets are extracted into named
//! fields; everything else rides along untouched in [`RawStatus`] so a
//! partially-unknown payload still yields complete raw data.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use crate::error::DecodeError;
use crate::types::{DeviceStateRecord, FanMode, FanOnlySpeed, HvacMode, RawStatus};

// Documented offsets into the per-zone info array.
const IDX_AUTO_HEAT_SP: usize = 0;
const IDX_AUTO_COOL_SP: usize = 1;
const IDX_COOL_SP: usize = 2;
const IDX_HEAT_SP: usize = 3;
const IDX_DRY_SP: usize = 4;
const IDX_DRY_FAN: usize = 5;
const IDX_FAN_MODE: usize = 6;
const IDX_COOL_FAN: usize = 7;
const IDX_AUTO_FAN: usize = 9;
const IDX_MODE: usize = 10;
const IDX_HEAT_FAN: usize = 11;
const IDX_TEMPERATURE: usize = 12;
const IDX_CURRENT_MODE: usize = 15;

/// Decode a decrypted status payload for one zone. The payload must be a
/// JSON object with a `Z_sts` map containing the requested zone; arrays
/// shorter than the documented offsets are tolerated (fields stay `None`).
pub fn decode(plaintext: &[u8], zone: u8) -> Result<DeviceStateRecord, DecodeError> {
    let value: Value = serde_json::from_slice(plaintext)
        .map_err(|e| DecodeError::Malformed(format!("invalid JSON: {e}")))?;
    let root = value
        .as_object()
        .ok_or_else(|| DecodeError::Malformed("payload is not a JSON object".to_string()))?;

    let z_sts = match root.get("Z_sts") {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(DecodeError::Malformed("Z_sts is not an object".to_string())),
        None => return Err(DecodeError::Malformed("Z_sts missing".to_string())),
    };

    // arrays are captured verbatim: a non-integer element stays in place
    // rather than shifting every later position
    let raw = RawStatus {
        prm: root
            .get("PRM")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        z_sts: z_sts
            .iter()
            .map(|(zone_id, info)| {
                let values = info.as_array().cloned().unwrap_or_default();
                (zone_id.clone(), values)
            })
            .collect::<BTreeMap<_, _>>(),
    };

    let info = raw
        .zone_info(zone)
        .ok_or(DecodeError::UnknownZone(zone))?
        .to_vec();

    let serial_number = root.get("SN").map(|sn| match sn {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    trace!(zone, len = info.len(), "decoding zone info array");

    Ok(DeviceStateRecord {
        zone,
        auto_heat_sp: at(&info, IDX_AUTO_HEAT_SP),
        auto_cool_sp: at(&info, IDX_AUTO_COOL_SP),
        cool_sp: at(&info, IDX_COOL_SP),
        heat_sp: at(&info, IDX_HEAT_SP),
        dry_sp: at(&info, IDX_DRY_SP),
        // the face plate reports tenths of a degree F
        face_plate_temperature: at(&info, IDX_TEMPERATURE).map(|t| t as f64 / 10.0),
        mode: at(&info, IDX_MODE).map(HvacMode::from_code),
        current_mode: at(&info, IDX_CURRENT_MODE).map(HvacMode::from_code),
        fan: at(&info, IDX_FAN_MODE).map(FanOnlySpeed::from_code),
        cool_fan: at(&info, IDX_COOL_FAN).map(FanMode::from_code),
        heat_fan: at(&info, IDX_HEAT_FAN).map(FanMode::from_code),
        auto_fan: at(&info, IDX_AUTO_FAN).map(FanMode::from_code),
        dry_fan: at(&info, IDX_DRY_FAN).map(FanMode::from_code),
        serial_number,
        raw,
    })
}

/// Integer at a fixed offset; absent or non-integer elements yield `None`
/// for the named field while staying intact in the raw array.
fn at(info: &[Value], idx: usize) -> Option<i64> {
    info.get(idx).and_then(Value::as_i64)
}
