//! Plaintext command envelopes for the EasyTouch JSON protocol.
//!
//! Two shapes exist on the wire: "Get Status" (optionally carrying a
//! location update) and "Change". Envelopes are built as plain
//! `serde_json::Value`s and encrypted just before the characteristic write.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::error::EmptyChangeError;
use crate::types::{ChangeSet, Credentials};

pub fn get_status(zone: u8, credentials: &Credentials, now: DateTime<Utc>) -> Value {
    json!({
        "Type": "Get Status",
        "Zone": zone,
        "EM": credentials.email_str(),
        "TM": now.timestamp(),
    })
}

/// "Get Status" variant that pushes the controller's location to the device.
/// The firmware expects LAT/LON as fixed 5-decimal strings, not numbers.
pub fn set_location(zone: u8, latitude: f64, longitude: f64, now: DateTime<Utc>) -> Value {
    json!({
        "Type": "Get Status",
        "Zone": zone,
        "LAT": format!("{latitude:.5}"),
        "LON": format!("{longitude:.5}"),
        "TM": now.timestamp(),
    })
}

/// Build a "Change" envelope. `Changes` always carries the zone; every other
/// field appears only when set. An envelope with nothing but the zone is
/// rejected here so it never reaches the radio.
pub fn change(zone: u8, changes: &ChangeSet) -> Result<Value, EmptyChangeError> {
    if changes.is_empty() {
        return Err(EmptyChangeError);
    }

    let mut fields = Map::new();
    fields.insert("zone".to_string(), json!(zone));

    if let Some(on) = changes.power {
        fields.insert("power".to_string(), json!(if on { 1 } else { 0 }));
    }
    if let Some(mode) = changes.mode {
        fields.insert("mode".to_string(), json!(mode.code()));
    }
    if let Some(sp) = changes.cool_sp {
        fields.insert("cool_sp".to_string(), json!(sp));
    }
    if let Some(sp) = changes.heat_sp {
        fields.insert("heat_sp".to_string(), json!(sp));
    }
    if let Some(sp) = changes.dry_sp {
        fields.insert("dry_sp".to_string(), json!(sp));
    }
    if let Some(sp) = changes.auto_cool_sp {
        fields.insert("autoCool_sp".to_string(), json!(sp));
    }
    if let Some(sp) = changes.auto_heat_sp {
        fields.insert("autoHeat_sp".to_string(), json!(sp));
    }
    if let Some(speed) = changes.fan_only {
        fields.insert("fanOnly".to_string(), json!(speed.code()));
    }
    if let Some(mode) = changes.cool_fan {
        fields.insert("coolFan".to_string(), json!(mode.code()));
    }
    if let Some(mode) = changes.heat_fan {
        fields.insert("heatFan".to_string(), json!(mode.code()));
    }
    if let Some(mode) = changes.auto_fan {
        fields.insert("autoFan".to_string(), json!(mode.code()));
    }
    if let Some(mode) = changes.dry_fan {
        fields.insert("dryFan".to_string(), json!(mode.code()));
    }

    Ok(json!({
        "Type": "Change",
        "Changes": Value::Object(fields),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FanMode, FanOnlySpeed, HvacMode};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn get_status_structure() {
        let creds = Credentials::new("rv@example.com", "pw");
        let msg = get_status(0, &creds, now());
        assert_eq!(msg["Type"], "Get Status");
        assert_eq!(msg["Zone"], 0);
        assert_eq!(msg["EM"], "rv@example.com");
        assert_eq!(msg["TM"], now().timestamp());
        // timestamp must be a JSON number
        assert!(msg["TM"].is_i64());
    }

    #[test]
    fn get_status_without_email() {
        let msg = get_status(1, &Credentials::default(), now());
        assert_eq!(msg["EM"], "");
        assert_eq!(msg["Zone"], 1);
    }

    #[test]
    fn set_location_formats_five_decimals() {
        let msg = set_location(0, 44.9778, -93.265, now());
        assert_eq!(msg["Type"], "Get Status");
        assert_eq!(msg["LAT"], "44.97780");
        assert_eq!(msg["LON"], "-93.26500");
    }

    #[test]
    fn empty_change_rejected() {
        assert!(change(0, &ChangeSet::new()).is_err());
    }

    #[test]
    fn power_change_includes_zone() {
        let msg = change(0, &ChangeSet::new().power(true)).unwrap();
        assert_eq!(msg["Type"], "Change");
        assert_eq!(msg["Changes"]["zone"], 0);
        assert_eq!(msg["Changes"]["power"], 1);
        assert!(msg["Changes"]["power"].is_i64());
    }

    #[test]
    fn full_change_set_serializes_all_fields() {
        let changes = ChangeSet::new()
            .power(true)
            .mode(HvacMode::Auto)
            .auto_setpoints(68, 76)
            .auto_fan(FanMode::FullAuto);
        let msg = change(2, &changes).unwrap();
        let c = &msg["Changes"];
        assert_eq!(c["zone"], 2);
        assert_eq!(c["mode"], 11);
        assert_eq!(c["autoHeat_sp"], 68);
        assert_eq!(c["autoCool_sp"], 76);
        assert_eq!(c["autoFan"], 128);
    }

    #[test]
    fn fan_only_change() {
        let msg = change(0, &ChangeSet::new().fan_only(FanOnlySpeed::High)).unwrap();
        assert_eq!(msg["Changes"]["fanOnly"], 2);
        assert!(msg["Changes"].get("coolFan").is_none());
    }
}
