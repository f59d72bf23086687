// models/src/pricing.rs
use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Static service price table (INR). Revenue aggregation multiplies paid
/// appointment counts against this map; service codes absent from the
/// table price at zero.
static PRICE_TABLE: Lazy<HashMap<&'static str, i64>> = Lazy::new(|| {
    HashMap::from([
        ("Pregnancy Ultrasound", 1200),
        ("Whole Abdomen Scan", 1500),
        ("TVS Scan", 1400),
        ("Color Doppler", 1800),
        ("Musculoskeletal Scan", 1600),
        ("Small Parts Scan", 1300),
        ("KUB Scan", 1100),
        ("Follicular Study", 900),
    ])
});

pub fn price_for(service: &str) -> i64 {
    PRICE_TABLE.get(service).copied().unwrap_or(0)
}
