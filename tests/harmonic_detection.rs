use harmonic668::config::DetectorConfig;
use harmonic668::core::noise::pink_noise;
use harmonic668::study::harmonics::{
    DEFAULT_TEST_DIVISORS, HarmonicDetector, default_active_channels, grid_rows, high_activity,
};
use rand::{SeedableRng, rngs::StdRng};

fn detector() -> HarmonicDetector {
    HarmonicDetector::new(&DetectorConfig::default()).expect("default detector")
}

#[test]
fn series_stays_below_nyquist() {
    let d = detector();
    let freqs: Vec<f64> = d.series.harmonics.iter().map(|h| h.freq).collect();
    assert!(freqs.iter().all(|&f| f < 500.0));
    // 668/1 is above Nyquist at 1 kHz.
    assert!(d.series.get(1).is_none());
    assert_eq!(d.series.get(2).map(|h| h.name.as_str()), Some("668/2 = 334.0Hz"));
}

#[test]
fn noisy_test_signal_reveals_included_harmonics() {
    let d = detector();
    let mut rng = StdRng::seed_from_u64(668);
    let signal = d.generate_test_signal(10.0, &DEFAULT_TEST_DIVISORS, &mut rng);
    assert_eq!(signal.t.len(), 10_000);

    let det = d.detect(&signal.noisy).expect("detect");
    for n in DEFAULT_TEST_DIVISORS {
        assert!(det.is_detected(n), "668/{n} missing from {:?}", det.detected_names());
    }
    assert!(det.activity_score > d.snr_threshold());

    let json = serde_json::to_value(&det).expect("serialize detection");
    assert!(json.get("detected").is_some());
    assert!(json.get("activity_score").is_some());
    assert!(json.get("psd").is_none());
}

#[test]
fn pure_pink_noise_scores_low() {
    let d = detector();
    let mut rng = StdRng::seed_from_u64(3);
    let noise: Vec<f64> = pink_noise(10_000, &mut rng).into_iter().map(|v| 0.3 * v).collect();
    let det = d.detect(&noise).expect("detect");
    assert!(det.detected.len() <= 1, "spurious hits {:?}", det.detected_names());
}

#[test]
fn active_channels_stand_out() {
    let d = detector();
    let mut rng = StdRng::seed_from_u64(11);
    let active = default_active_channels();
    let data = d.simulate_channels(100, 4.0, &active, &mut rng);
    assert_eq!(data.n_channels(), 100);

    let scores = d.analyze_channels(&data).expect("analyze");
    let strong = high_activity(&scores, 5.0);
    let strong_ids: Vec<usize> = strong.iter().map(|s| s.channel).collect();
    let hits_in_active = strong_ids.iter().filter(|c| active.contains(c)).count();
    assert!(hits_in_active >= 35, "only {hits_in_active} active channels scored high");
    assert!(grid_rows(1..3, 10).contains(&15));
}
