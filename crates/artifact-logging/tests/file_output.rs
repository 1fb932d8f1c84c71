//! Installs the global subscriber once and checks the JSONL file output

use artifact_logging::{ArtifactSubscriberBuilder, FileConfig, LoggingError, RotationStrategy};

#[test]
fn test_jsonl_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig {
        directory: dir.path().to_path_buf(),
        prefix: "artifact".to_string(),
        rotation: RotationStrategy::Never,
        max_files: None,
    };

    let guard = ArtifactSubscriberBuilder::new()
        .with_console(false)
        .with_level("info")
        .with_file_output(file)
        .try_init()
        .unwrap();
    assert!(guard.is_some());

    let span = tracing::info_span!("lifecycle", jid = "bot@x.org");
    span.in_scope(|| {
        tracing::info!(session_id = 7, "Connected");
    });

    // Flush the non-blocking writer
    drop(guard);

    let contents = std::fs::read_to_string(dir.path().join("artifact.log")).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let event = lines
        .iter()
        .find(|line| line["message"] == "Connected")
        .expect("connected event logged");
    assert_eq!(event["session_id"], 7);
    assert_eq!(event["level"], "INFO");
    assert_eq!(event["span"]["jid"], "bot@x.org");

    // Only one global subscriber per process
    let err = ArtifactSubscriberBuilder::new().try_init().unwrap_err();
    assert!(matches!(err, LoggingError::AlreadyInitialized(_)));
}
