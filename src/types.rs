use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Device credentials, fixed for the lifetime of a session. A device with no
/// password configured leaves both fields unset; key derivation still works.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    pub fn email_str(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }
}

/// EasyTouch HVAC mode codes. Setpoint modes and their running variants
/// (cool_on=3, heat_on=5) are distinct on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    FanOnly,
    Cool,
    CoolOn,
    Heat,
    HeatOn,
    Dry,
    Auto,
    /// Firmware sent a code outside the documented table. Carries the
    /// original wire value so operators can spot the drifting code
    /// instead of misreading `off`.
    Unknown(i64),
}

impl HvacMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => HvacMode::Off,
            1 => HvacMode::FanOnly,
            2 => HvacMode::Cool,
            3 => HvacMode::CoolOn,
            4 => HvacMode::Heat,
            5 => HvacMode::HeatOn,
            6 => HvacMode::Dry,
            11 => HvacMode::Auto,
            other => HvacMode::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            HvacMode::Off => 0,
            HvacMode::FanOnly => 1,
            HvacMode::Cool => 2,
            HvacMode::CoolOn => 3,
            HvacMode::Heat => 4,
            HvacMode::HeatOn => 5,
            HvacMode::Dry => 6,
            HvacMode::Auto => 11,
            HvacMode::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::FanOnly => "fan",
            HvacMode::Cool => "cool",
            HvacMode::CoolOn => "cool_on",
            HvacMode::Heat => "heat",
            HvacMode::HeatOn => "heat_on",
            HvacMode::Dry => "dry",
            HvacMode::Auto => "auto",
            HvacMode::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan mode codes shared by the cooling/heating/auto/dry contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Off,
    ManualLow,
    ManualHigh,
    CycledLow,
    CycledHigh,
    FullAuto,
    Unknown(i64),
}

impl FanMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FanMode::Off,
            1 => FanMode::ManualLow,
            2 => FanMode::ManualHigh,
            65 => FanMode::CycledLow,
            66 => FanMode::CycledHigh,
            128 => FanMode::FullAuto,
            other => FanMode::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            FanMode::Off => 0,
            FanMode::ManualLow => 1,
            FanMode::ManualHigh => 2,
            FanMode::CycledLow => 65,
            FanMode::CycledHigh => 66,
            FanMode::FullAuto => 128,
            FanMode::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanMode::Off => "off",
            FanMode::ManualLow => "manualL",
            FanMode::ManualHigh => "manualH",
            FanMode::CycledLow => "cycledL",
            FanMode::CycledHigh => "cycledH",
            FanMode::FullAuto => "full auto",
            FanMode::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduced fan table used when the unit is in fan-only mode (0/1/2 only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOnlySpeed {
    Off,
    Low,
    High,
    Unknown(i64),
}

impl FanOnlySpeed {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FanOnlySpeed::Off,
            1 => FanOnlySpeed::Low,
            2 => FanOnlySpeed::High,
            other => FanOnlySpeed::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            FanOnlySpeed::Off => 0,
            FanOnlySpeed::Low => 1,
            FanOnlySpeed::High => 2,
            FanOnlySpeed::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FanOnlySpeed::Off => "off",
            FanOnlySpeed::Low => "low",
            FanOnlySpeed::High => "high",
            FanOnlySpeed::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for FanOnlySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested field changes for a `Change` command. Only set fields are sent;
/// an entirely unset set is rejected before anything touches the radio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub power: Option<bool>,
    pub mode: Option<HvacMode>,
    pub cool_sp: Option<i64>,
    pub heat_sp: Option<i64>,
    pub dry_sp: Option<i64>,
    pub auto_cool_sp: Option<i64>,
    pub auto_heat_sp: Option<i64>,
    pub fan_only: Option<FanOnlySpeed>,
    pub cool_fan: Option<FanMode>,
    pub heat_fan: Option<FanMode>,
    pub auto_fan: Option<FanMode>,
    pub dry_fan: Option<FanMode>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(mut self, on: bool) -> Self {
        self.power = Some(on);
        self
    }

    pub fn mode(mut self, mode: HvacMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn cool_setpoint(mut self, temp: i64) -> Self {
        self.cool_sp = Some(temp);
        self
    }

    pub fn heat_setpoint(mut self, temp: i64) -> Self {
        self.heat_sp = Some(temp);
        self
    }

    pub fn dry_setpoint(mut self, temp: i64) -> Self {
        self.dry_sp = Some(temp);
        self
    }

    pub fn auto_setpoints(mut self, heat: i64, cool: i64) -> Self {
        self.auto_heat_sp = Some(heat);
        self.auto_cool_sp = Some(cool);
        self
    }

    pub fn fan_only(mut self, speed: FanOnlySpeed) -> Self {
        self.fan_only = Some(speed);
        self
    }

    pub fn cool_fan(mut self, mode: FanMode) -> Self {
        self.cool_fan = Some(mode);
        self
    }

    pub fn heat_fan(mut self, mode: FanMode) -> Self {
        self.heat_fan = Some(mode);
        self
    }

    pub fn auto_fan(mut self, mode: FanMode) -> Self {
        self.auto_fan = Some(mode);
        self
    }

    pub fn dry_fan(mut self, mode: FanMode) -> Self {
        self.dry_fan = Some(mode);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.mode.is_none()
            && self.cool_sp.is_none()
            && self.heat_sp.is_none()
            && self.dry_sp.is_none()
            && self.auto_cool_sp.is_none()
            && self.auto_heat_sp.is_none()
            && self.fan_only.is_none()
            && self.cool_fan.is_none()
            && self.heat_fan.is_none()
            && self.auto_fan.is_none()
            && self.dry_fan.is_none()
    }
}

/// Raw pass-through of the device response: position-encoded `PRM` parameter
/// flags plus the per-zone `Z_sts` info arrays, verbatim. Elements are kept
/// as untouched JSON values so a non-integer entry never shifts the
/// positions of the elements after it; undocumented positions ride along
/// for diagnostics and future firmware.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatus {
    pub prm: Vec<Value>,
    pub z_sts: BTreeMap<String, Vec<Value>>,
}

impl RawStatus {
    /// PRM value 7 present means the device indicates power off.
    pub fn power_off_indicated(&self) -> bool {
        self.prm.iter().any(|v| v.as_i64() == Some(7))
    }

    /// PRM value 15 present means the device indicates power on.
    pub fn power_on_indicated(&self) -> bool {
        self.prm.iter().any(|v| v.as_i64() == Some(15))
    }

    pub fn zone_info(&self, zone: u8) -> Option<&[Value]> {
        self.z_sts.get(&zone.to_string()).map(Vec::as_slice)
    }
}

/// Decoded thermostat state for one zone. Produced fresh by every exchange
/// and never mutated afterwards. Fields the firmware did not report (short
/// info array) stay `None`; the raw arrays are always complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStateRecord {
    pub zone: u8,
    pub auto_heat_sp: Option<i64>,
    pub auto_cool_sp: Option<i64>,
    pub cool_sp: Option<i64>,
    pub heat_sp: Option<i64>,
    pub dry_sp: Option<i64>,
    /// Face plate reading in degrees F, already scaled from tenths.
    pub face_plate_temperature: Option<f64>,
    /// Configured mode (info offset 10).
    pub mode: Option<HvacMode>,
    /// Running mode (info offset 15), e.g. `cool_on` while the compressor runs.
    pub current_mode: Option<HvacMode>,
    /// Fan-only speed (info offset 6).
    pub fan: Option<FanOnlySpeed>,
    pub cool_fan: Option<FanMode>,
    pub heat_fan: Option<FanMode>,
    pub auto_fan: Option<FanMode>,
    pub dry_fan: Option<FanMode>,
    pub serial_number: Option<String>,
    pub raw: RawStatus,
}

/// Outcome of zone discovery. Falling back to zone 0 is an expected path on
/// firmware that omits `Z_sts` from the probe response, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneDiscovery {
    Discovered(Vec<u8>),
    Fallback(Vec<u8>),
}

impl ZoneDiscovery {
    pub fn zones(&self) -> &[u8] {
        match self {
            ZoneDiscovery::Discovered(z) | ZoneDiscovery::Fallback(z) => z,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ZoneDiscovery::Fallback(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hvac_mode_code_roundtrip() {
        for code in [0i64, 1, 2, 3, 4, 5, 6, 11] {
            assert_eq!(HvacMode::from_code(code).code(), code);
        }
    }

    #[test]
    fn hvac_mode_unknown_is_explicit() {
        let mode = HvacMode::from_code(99);
        assert_eq!(mode, HvacMode::Unknown(99));
        assert_eq!(mode.as_str(), "unknown");
    }

    #[test]
    fn unknown_codes_keep_the_wire_value() {
        // distinct drifting codes must stay distinguishable
        assert_ne!(HvacMode::from_code(300), HvacMode::from_code(400));
        assert_eq!(HvacMode::from_code(300).code(), 300);
        assert_eq!(FanMode::from_code(300).code(), 300);
    }

    #[test]
    fn fan_mode_code_roundtrip() {
        for code in [0i64, 1, 2, 65, 66, 128] {
            assert_eq!(FanMode::from_code(code).code(), code);
        }
        assert_eq!(FanMode::from_code(42), FanMode::Unknown(42));
    }

    #[test]
    fn fan_only_table_is_reduced() {
        assert_eq!(FanOnlySpeed::from_code(2), FanOnlySpeed::High);
        // 128 is full-auto in the shared table but has no fan-only meaning
        assert_eq!(FanOnlySpeed::from_code(128), FanOnlySpeed::Unknown(128));
    }

    #[test]
    fn change_set_emptiness() {
        assert!(ChangeSet::new().is_empty());
        assert!(!ChangeSet::new().power(true).is_empty());
        assert!(!ChangeSet::new().auto_setpoints(68, 76).is_empty());
    }

    #[test]
    fn prm_flags() {
        let raw = RawStatus {
            prm: vec![serde_json::json!(7), serde_json::json!(3)],
            z_sts: BTreeMap::new(),
        };
        assert!(raw.power_off_indicated());
        assert!(!raw.power_on_indicated());
    }
}
