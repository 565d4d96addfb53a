//! Fuzz test for webhook signature verification
//!
//! Arbitrary signature header values must be rejected without panicking,
//! and a body's own signature must always verify.
//!
//! Run with: cargo +nightly fuzz run signature_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use secrecy::SecretString;
use voxorder_core::WebhookVerifier;

fuzz_target!(|input: (&[u8], &str)| {
    let (body, header) = input;
    let verifier = WebhookVerifier::new(SecretString::from("whsec_fuzz".to_string()));

    let Some(expected) = verifier.sign(body) else {
        return;
    };
    assert!(verifier.verify(body, Some(&expected)).is_valid());

    if !header.trim().eq_ignore_ascii_case(&expected) {
        assert!(!verifier.verify(body, Some(header)).is_valid());
    }
});
