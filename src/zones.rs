//! Zone discovery from a probe response.

use tracing::debug;

use crate::types::{DeviceStateRecord, ZoneDiscovery};

/// Derive the available zones from the raw `Z_sts` key set of a probe
/// response. Any discovery failure (no zones, an unparseable zone id)
/// falls back to the single default zone rather than failing the caller.
pub fn discover(record: &DeviceStateRecord) -> ZoneDiscovery {
    let mut zones = Vec::with_capacity(record.raw.z_sts.len());
    for key in record.raw.z_sts.keys() {
        match key.parse::<u8>() {
            Ok(zone) => zones.push(zone),
            Err(_) => {
                debug!(%key, "unparseable zone id in Z_sts, falling back to zone 0");
                return ZoneDiscovery::Fallback(vec![0]);
            }
        }
    }

    if zones.is_empty() {
        debug!("probe response carried no zones, falling back to zone 0");
        return ZoneDiscovery::Fallback(vec![0]);
    }

    zones.sort_unstable();
    zones.dedup();
    ZoneDiscovery::Discovered(zones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::decode;

    #[test]
    fn discovers_sorted_zone_set() {
        let payload = br#"{"Z_sts": {"2": [1], "0": [1], "1": [1]}}"#;
        let record = decode(payload, 0).unwrap();
        let discovery = discover(&record);
        assert_eq!(discovery, ZoneDiscovery::Discovered(vec![0, 1, 2]));
        assert!(!discovery.is_fallback());
    }

    #[test]
    fn empty_z_sts_falls_back() {
        let record = DeviceStateRecord::default();
        let discovery = discover(&record);
        assert_eq!(discovery, ZoneDiscovery::Fallback(vec![0]));
        assert!(discovery.is_fallback());
    }

    #[test]
    fn garbage_zone_key_falls_back() {
        let payload = br#"{"Z_sts": {"0": [1], "main": [1]}}"#;
        let record = decode(payload, 0).unwrap();
        assert_eq!(discover(&record), ZoneDiscovery::Fallback(vec![0]));
    }
}
