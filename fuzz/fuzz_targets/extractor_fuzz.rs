//! Fuzz test for order extraction
//!
//! Arbitrary utterance text must always yield an extraction, and the
//! delivery time must be a valid instant.
//!
//! Run with: cargo +nightly fuzz run extractor_fuzz -- -max_total_time=60

#![no_main]

use chrono::{FixedOffset, TimeZone};
use libfuzzer_sys::fuzz_target;
use voxorder_core::extract_order;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some(offset) = FixedOffset::east_opt(0) else {
        return;
    };
    let Some(now) = offset.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).single() else {
        return;
    };

    let order = extract_order(text, now);

    if let Some(raw) = &order.raw_time_expression {
        assert_eq!(raw, &raw.to_lowercase());
    }
    // Delivery is always today in the delivery zone.
    let delivered = order.delivery_time.with_timezone(&offset).date_naive();
    assert_eq!(delivered, now.date_naive());
    assert_eq!(order.is_complete(), order.missing_fields().is_empty());
});
