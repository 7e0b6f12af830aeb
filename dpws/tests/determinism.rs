//! Reproducibility: identical seed, configuration, and worker count must
//! produce byte-identical capture files.

use dpws::{Configuration, Dpws, RunOptions};
use std::fs;
use std::path::Path;

const YAML: &str = r#"
global_settings:
  capture:
    pcap_prefix: "wave"
  attack:
    burst_duration_s: 0.5
    target_switch_duration_s: 0.0
    source_seed: 11
    attack_vectors:
      - type: udp_flooding
        data_rate: "1Mbps"
        packet_size: 400
        source_port: -1
        destination_port: 80
  scheduling:
    simulation_duration_s: 2.0
central_network:
  topology_seed: 47
  degree_of_redundancy: 0.0
  nodes:
    - id: cn-1
    - id: cn-2
autonomous_systems:
  - id: victims
    network_address: "30.1.1.0"
    attachment:
      central_network_attachment_node: cn-1
  - id: bots
    network_address: "40.1.1.0"
    attachment:
      central_network_attachment_node: cn-2
target_server_nodes:
  - id: victim-1
    owner_as: victims
  - id: victim-2
    owner_as: victims
attacker_nodes:
  - id: bot
    owner_as: bots
    max_data_rate_fluctuation: 0.2
"#;

/// Runs the scenario into `directory` and returns the capture files as
/// `(file name, contents)`, sorted by name.
fn capture_run(directory: &Path) -> Vec<(String, Vec<u8>)> {
    let _ = fs::remove_dir_all(directory);
    fs::create_dir_all(directory).unwrap();

    let config = Configuration::from_yaml(YAML).unwrap();
    let mut dpws = Dpws::assemble(
        &config,
        RunOptions {
            capture_directory: directory.to_path_buf(),
            ..Default::default()
        },
    )
    .unwrap();
    dpws.run().unwrap();

    let mut files: Vec<(String, Vec<u8>)> = dpws
        .capture_files()
        .iter()
        .map(|path| {
            (
                path.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read(path).unwrap(),
            )
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

#[test]
fn identical_runs_write_identical_captures() {
    let base = std::env::temp_dir().join("dpws-determinism");
    let first = capture_run(&base.join("first"));
    let second = capture_run(&base.join("second"));

    assert!(!first.is_empty());
    assert_eq!(first.len(), second.len());
    for ((name_a, bytes_a), (name_b, bytes_b)) in first.iter().zip(&second) {
        assert_eq!(name_a, name_b);
        assert_eq!(
            bytes_a, bytes_b,
            "capture {name_a} differs between identical runs"
        );
    }
    let _ = fs::remove_dir_all(&base);
}

#[test]
fn capture_files_follow_the_naming_convention() {
    let directory = std::env::temp_dir().join("dpws-capture-names");
    let files = capture_run(&directory);

    // one transit link captured at both endpoints, plus one attachment-link
    // capture per AS, all on worker 0
    assert_eq!(files.len(), 4);
    for (name, bytes) in &files {
        assert!(name.starts_with("wave__"), "unexpected name {name}");
        assert!(name.contains("-to-"), "unexpected name {name}");
        assert!(name.contains("____"), "unexpected name {name}");
        assert!(name.ends_with(".pcap"), "unexpected name {name}");
        // at least the global header
        assert!(bytes.len() >= 24);
    }
    // the transit link saw the flood in both directions of naming
    assert!(files
        .iter()
        .any(|(name, _)| name.contains("cn-1-to-cn-2") || name.contains("cn-2-to-cn-1")));
    // attachment captures are labeled transit-node-to-AS
    assert!(files.iter().any(|(name, _)| name.contains("-to-victims")));
    assert!(files.iter().any(|(name, _)| name.contains("-to-bots")));

    // the flood actually crossed the transit link: captures carry records
    let largest = files.iter().map(|(_, bytes)| bytes.len()).max().unwrap();
    assert!(largest > 24);
    let _ = fs::remove_dir_all(&directory);
}
