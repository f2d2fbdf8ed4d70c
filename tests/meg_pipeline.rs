use harmonic668::config::MegConfig;
use harmonic668::study::meg::{MEG_HARMONICS, MegSimulator};
use rand::{SeedableRng, rngs::StdRng};

fn short_config() -> MegConfig {
    MegConfig {
        n_channels: 12,
        duration_seconds: 30.0,
        lowpass_hz: 400.0,
        ..MegConfig::default()
    }
}

#[test]
fn short_recording_summary() {
    let sim = MegSimulator::new(&short_config()).unwrap();
    assert_eq!(sim.n_samples(), 30_000);
    assert_eq!(sim.n_segments(), 2);

    let mut rng = StdRng::seed_from_u64(306);
    let analysis = sim.run(&mut rng).unwrap();
    let s = &analysis.summary;
    assert_eq!(s.n_channels, 12);
    assert_eq!(s.magnetometers, 4);
    assert_eq!(s.gradiometers, 8);
    assert_eq!(s.n_segments, 2);
    assert_eq!(s.harmonics.len(), MEG_HARMONICS.len());
    for h in &s.harmonics {
        assert_eq!(h.segment_powers.len(), 2);
        assert!(h.mean_power > 0.0);
        assert!(h.max_power >= h.mean_power);
        assert!((0.0..=100.0).contains(&h.detection_rate));
    }

    let channels: Vec<usize> = analysis.excerpts.iter().map(|e| e.channel).collect();
    assert_eq!(channels, vec![0, 10]);
    assert_eq!(analysis.excerpt_times.len(), 10_001);
    assert!(analysis.excerpts.iter().all(|e| e.samples.len() == 10_001));
    assert_eq!(analysis.mean_psd.freqs.len(), 2049);

    let json = serde_json::to_value(s).unwrap();
    assert_eq!(json["n_segments"], 2);
    assert_eq!(json["harmonics"].as_array().map(Vec::len), Some(3));
}

#[test]
fn too_short_recording_is_rejected() {
    let cfg = MegConfig {
        n_channels: 3,
        duration_seconds: 5.0,
        ..MegConfig::default()
    };
    let sim = MegSimulator::new(&cfg).unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    assert!(sim.run(&mut rng).is_err());
}

#[test]
fn empty_passband_is_rejected() {
    let cfg = MegConfig {
        highpass_hz: 300.0,
        lowpass_hz: 200.0,
        ..MegConfig::default()
    };
    assert!(MegSimulator::new(&cfg).is_err());
}
