use super::{MeterKind, MeterSample, Reading};

/// A generation reading labelled with the meter it came from
#[derive(Debug, Clone)]
pub struct TaggedReading {
    pub name: String,
    pub host: String,
    pub reading: Option<Reading>,
}

/// Sum several generation readings into one.
///
/// Only non-empty inputs contribute; they are kept in `meters` in input order.
/// Returns `None` when nothing contributed. The combined timestamp is the
/// newest contributing timestamp.
pub fn combine_generation(inputs: &[TaggedReading]) -> Option<Reading> {
    let meters: Vec<MeterSample> = inputs
        .iter()
        .filter_map(|t| {
            t.reading.as_ref().map(|r| MeterSample {
                name: t.name.clone(),
                host: t.host.clone(),
                total_export_kwh: r.total_export_kwh,
                active_power_w: r.active_power_w,
                timestamp: r.timestamp,
            })
        })
        .collect();

    let timestamp = meters.iter().map(|m| m.timestamp).max()?;
    let total_export_kwh = meters.iter().map(|m| m.total_export_kwh).sum();
    let active_power_w = meters.iter().map(|m| m.active_power_w).sum();

    Some(Reading {
        kind: MeterKind::Generation,
        total_import_kwh: None,
        total_export_kwh,
        active_power_w,
        phase_power: None,
        voltage: None,
        timestamp,
        meter_count: meters.len(),
        meters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::{DevicePayload, normalize_generation};
    use chrono::{Duration, Utc};

    fn tagged(name: &str, export: f64, power: f64, offset_s: i64) -> TaggedReading {
        let payload = DevicePayload {
            total_power_export_kwh: Some(export),
            active_power_w: Some(power),
            ..Default::default()
        };
        TaggedReading {
            name: name.to_string(),
            host: format!("{}.local", name),
            reading: normalize_generation(Some(&payload), Utc::now() + Duration::seconds(offset_s)),
        }
    }

    #[test]
    fn test_empty_inputs_yield_none() {
        assert!(combine_generation(&[]).is_none());
        let absent = TaggedReading {
            name: "roof".to_string(),
            host: "10.0.0.3".to_string(),
            reading: None,
        };
        assert!(combine_generation(&[absent]).is_none());
    }

    #[test]
    fn test_sums_non_empty_inputs() {
        let inputs = vec![
            tagged("east", 1000.0, 1200.0, 0),
            TaggedReading {
                name: "broken".to_string(),
                host: "10.0.0.9".to_string(),
                reading: None,
            },
            tagged("west", 500.5, 800.0, 2),
        ];
        let combined = combine_generation(&inputs).unwrap();
        assert_eq!(combined.active_power_w, 2000.0);
        assert_eq!(combined.total_export_kwh, 1500.5);
        assert_eq!(combined.meter_count, 2);
        assert_eq!(combined.meters[0].name, "east");
        assert_eq!(combined.meters[1].name, "west");
        assert_eq!(combined.timestamp, inputs[2].reading.as_ref().unwrap().timestamp);
    }

    #[test]
    fn test_order_independent_totals() {
        let a = tagged("a", 10.0, 100.0, 0);
        let b = tagged("b", 20.0, 250.0, 0);
        let ab = combine_generation(&[a.clone(), b.clone()]).unwrap();
        let ba = combine_generation(&[b, a]).unwrap();
        assert_eq!(ab.active_power_w, ba.active_power_w);
        assert_eq!(ab.total_export_kwh, ba.total_export_kwh);
    }
}
