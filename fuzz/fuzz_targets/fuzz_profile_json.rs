//! Fuzz target: `Profile::from_json`
//!
//! Feeds arbitrary text to the profile document parser and checks:
//! - No panics under any input
//! - Every accepted profile has strictly increasing point times
//! - `target_at` stays inside the range spanned by the control points
//!
//! cargo fuzz run fuzz_profile_json

#![no_main]

use kilnctl::profile::Profile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(profile) = Profile::from_json("fuzz", text) else {
        return;
    };

    let points = profile.points();
    assert!(!points.is_empty());
    for w in points.windows(2) {
        assert!(w[0].elapsed_secs < w[1].elapsed_secs);
    }

    let lo = points.iter().map(|p| p.target).fold(f64::INFINITY, f64::min);
    let hi = points.iter().map(|p| p.target).fold(f64::NEG_INFINITY, f64::max);
    let end = profile.duration();
    for i in 0..=16 {
        let t = target_probe(end, i);
        let v = profile.target_at(t);
        assert!(v >= lo - 1e-6 * lo.abs().max(1.0) && v <= hi + 1e-6 * hi.abs().max(1.0));
    }
});

fn target_probe(end: f64, i: u32) -> f64 {
    end * f64::from(i) / 15.0
}
