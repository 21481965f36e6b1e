#![no_main]
use libfuzzer_sys::fuzz_target;
use pvbridge::reading::{DevicePayload, normalize_generation, normalize_grid};

fuzz_target!(|data: &[u8]| {
    // Arbitrary JSON as a device would return it
    let Ok(payload) = serde_json::from_slice::<DevicePayload>(data) else {
        return;
    };
    let now = chrono::Utc::now();

    if let Some(reading) = normalize_grid(Some(&payload), now) {
        let _ = reading.voltage_avg_v();
    }
    let _ = normalize_generation(Some(&payload), now);
});
