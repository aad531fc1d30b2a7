use super::*;
use std::io::Write;

use eventcast_events::ClusterEvent;

// =============================================================================
// Config loading
// =============================================================================

#[test]
fn test_load_config_explicit_path_must_exist() {
    let result = load_config(Some(PathBuf::from("/nonexistent/eventcast.toml")));
    assert!(result.is_err());
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    writeln!(file, "[relay]\ncapacity = 42").expect("write config");

    let config = load_config(Some(file.path().to_path_buf())).expect("load config");
    assert_eq!(config.relay.capacity, 42);
}

#[test]
fn test_load_config_rejects_invalid_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    writeln!(file, "[relay]\ncapacity = 0").expect("write config");

    assert!(load_config(Some(file.path().to_path_buf())).is_err());
}

// =============================================================================
// Sink construction
// =============================================================================

#[tokio::test]
async fn test_build_stdout_sink_and_drain() {
    let config: Config = "[sink]\ntype = \"stdout\"\ncolor = false".parse().unwrap();
    let cancel = CancellationToken::new();

    let (sink, task) = build_sink(&config, cancel.clone()).expect("build sink");
    sink.forward(Arc::new(ClusterEvent::default()), None);

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("drain task timed out")
        .expect("drain task panicked");
}

#[tokio::test]
async fn test_build_seqlog_sink() {
    let config: Config = r#"
[sink]
type = "seqlog"
endpoint = "http://localhost:9"
log_stream = "s"
"#
    .parse()
    .unwrap();
    let cancel = CancellationToken::new();

    let (_sink, task) = build_sink(&config, cancel.clone()).expect("build sink");
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("drain task timed out")
        .expect("drain task panicked");
}

#[tokio::test]
async fn test_build_sink_maps_relay_settings() {
    // drop_newest + tiny capacity: the third forward is the one lost
    let config: Config = r#"
[relay]
capacity = 2
drop_oldest = false

[sink]
type = "stdout"
color = false
"#
    .parse()
    .unwrap();
    let cancel = CancellationToken::new();

    let (sink, task) = build_sink(&config, cancel.clone()).expect("build sink");
    for _ in 0..3 {
        sink.forward(Arc::new(ClusterEvent::default()), None);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("drain task timed out")
        .expect("drain task panicked");
}
