use harmonic668::study::torus::{BASE_FREQUENCY, TorusSimulator};

fn unique_path(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "harmonic668_torus_{}_{}",
        name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    path
}

#[test]
fn export_json_has_fixed_keys() {
    let mut sim = TorusSimulator::new(4, BASE_FREQUENCY).unwrap();
    sim.simulate(1.0, 0.01).unwrap();
    assert_eq!(sim.history.len(), 100);

    let path = unique_path("export.json");
    sim.export_json(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let obj = value.as_object().unwrap();
    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "base_frequency",
            "coupling",
            "critical_points",
            "genus",
            "insights",
            "integrated_phi",
            "num_interactions",
            "num_states",
        ]
    );
    assert_eq!(obj["genus"], 4);
    assert_eq!(obj["num_interactions"], 6);
    assert_eq!(obj["num_states"], 100);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn interaction_matrix_is_symmetric() {
    let mut sim = TorusSimulator::new(4, BASE_FREQUENCY).unwrap();
    sim.simulate(0.5, 0.001).unwrap();
    let m = sim.interaction_matrix(100);
    for i in 0..4 {
        assert_eq!(m[i][i], 0.0);
        for j in 0..4 {
            assert!((m[i][j] - m[j][i]).abs() < 1e-12);
        }
    }
}

#[test]
fn rejects_bad_setup() {
    assert!(TorusSimulator::new(0, BASE_FREQUENCY).is_err());
    assert!(TorusSimulator::new(4, 0.0).is_err());
    let mut sim = TorusSimulator::new(4, BASE_FREQUENCY).unwrap();
    assert!(sim.simulate(1.0, 0.0).is_err());
}
