//! End-to-end tests for the classification pipeline.
//!
//! A recorded squat-then-lunge session is replayed through the public API
//! and checked frame by frame.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use repcoach_core::{
    Config, ExerciseId, ExerciseState, FrameResult, LandmarkFrame, ReplayRecord, Replayer,
    SessionController, Side, Tier,
};

/// Directory holding the integration fixtures.
fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn replay_fixture(config: &Config) -> (Vec<FrameResult>, repcoach_core::ReplaySummary) {
    let file = File::open(fixture_dir().join("squat-session.jsonl"))
        .expect("Failed to open session fixture");
    let replayer = Replayer::new(config, ExerciseId::Squat).expect("Failed to create replayer");

    let mut results = Vec::new();
    let summary = replayer
        .run(BufReader::new(file), |result| results.push(result.clone()))
        .expect("Replay failed");
    (results, summary)
}

/// Tests that the sample config loads with its overrides.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_dir(&fixture_dir()).expect("Failed to load config");

    assert_eq!(config.default_exercise, ExerciseId::Squat);
    assert_eq!(config.feedback_duration_ms, 1500);
    assert_eq!(config.side, Side::Left);
    assert_eq!(config.server.port, 3100);
    assert!((config.calibration.center_min - 0.35).abs() < f64::EPSILON);

    let curl = config.profiles().get(ExerciseId::DumbbellCurl).down_enter;
    assert!((curl.value() - 45.0).abs() < f64::EPSILON);
}

/// Tests the full recorded session frame by frame.
#[test]
fn test_recorded_session_trace() {
    use ExerciseId::{Lunge, Squat};
    use ExerciseState::{Down, Up};

    let (results, _) = replay_fixture(&Config::default());
    assert_eq!(results.len(), 13);

    let trace: Vec<(ExerciseId, ExerciseState, u32)> = results
        .iter()
        .map(|r| (r.exercise, r.state, r.rep_count))
        .collect();

    assert_eq!(
        trace,
        vec![
            (Squat, Up, 0),   // calibration
            (Squat, Up, 0),   // 175
            (Squat, Up, 0),   // 140
            (Squat, Up, 0),   // 120
            (Squat, Down, 1), // 100
            (Squat, Down, 1), // 90
            (Squat, Down, 1), // ankle missing
            (Squat, Up, 1),   // 175
            (Squat, Down, 2), // 100
            (Squat, Up, 2),   // 175
            (Lunge, Up, 0),   // off center
            (Lunge, Up, 0),   // calibration
            (Lunge, Down, 1), // 100
        ]
    );
}

/// Tests the feedback issued along the recorded session.
#[test]
fn test_recorded_session_feedback() {
    let (results, _) = replay_fixture(&Config::default());

    let tier = |i: usize| results[i].feedback.as_ref().map(|f| f.tier);

    assert_eq!(
        results[0].feedback_text(),
        Some("You're in position, let's go!")
    );
    // Standing tall again while the calibration message is still up
    assert_eq!(
        results[1].feedback_text(),
        Some("You're in position, let's go!")
    );
    assert_eq!(tier(2), Some(Tier::Bad));
    assert_eq!(
        results[2].feedback_text(),
        Some("Bend your knees more to go deeper")
    );
    assert_eq!(tier(3), Some(Tier::SoSo));
    assert_eq!(results[4].feedback_text(), Some("Great squat!"));
    assert_eq!(tier(4), Some(Tier::Ok));
    assert_eq!(results[7].feedback_text(), Some("Stand up tall"));

    assert_eq!(
        results[10].feedback_text(),
        Some("Move to the center of the frame")
    );
    assert!(!results[10].calibrated);
    assert!(results[11].calibrated);
    assert_eq!(results[12].feedback_text(), Some("Great lunge!"));

    let counted: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.counted)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(counted, vec![4, 8, 12]);
}

/// Tests the per-exercise summary of the recorded session.
#[test]
fn test_recorded_session_summary() {
    let (results, summary) = replay_fixture(&Config::default());

    assert!(!results[6].signal);
    assert_eq!(summary.segments.len(), 2);

    let squat = &summary.segments[0];
    assert_eq!(squat.exercise, ExerciseId::Squat);
    assert_eq!(squat.reps, 2);
    assert!(squat.calibrated);
    assert_eq!(squat.frames_processed, 10);
    assert_eq!(squat.frames_without_signal, 1);

    let lunge = summary.last().expect("Missing final segment");
    assert_eq!(lunge.exercise, ExerciseId::Lunge);
    assert_eq!(lunge.reps, 1);
    assert!(lunge.calibrated);
    assert_eq!(lunge.frames_processed, 3);
    assert_eq!(summary.frames_processed(), 13);
}

/// Tests that a stricter threshold override changes what counts.
#[test]
fn test_threshold_override_changes_counting() {
    let mut config = Config::default();
    config.thresholds.insert(
        ExerciseId::Squat,
        repcoach_core::ThresholdOverride {
            down_enter: Some(95.0),
            up_enter: None,
        },
    );

    let (results, summary) = replay_fixture(&config);

    // 100 degrees is no longer deep enough; 90 is
    assert_eq!(results[4].rep_count, 0);
    assert_eq!(results[5].rep_count, 1);
    assert_eq!(summary.segments[0].reps, 1);
}

/// Tests that the right side is measured when configured.
#[test]
fn test_right_side_measurement() {
    let config = Config {
        side: Side::Right,
        ..Config::default()
    };
    let (results, summary) = replay_fixture(&config);

    // The fixture moves both legs together
    assert_eq!(summary.segments[0].reps, 2);
    assert_eq!(results[12].rep_count, 1);
}

/// Tests driving the controller directly with parsed fixture records.
#[test]
fn test_controller_discards_frames_from_previous_selection() {
    let mut controller = SessionController::new(&Config::default()).expect("Invalid config");
    let first_epoch = controller.select_exercise(ExerciseId::Squat);

    let contents = std::fs::read_to_string(fixture_dir().join("squat-session.jsonl"))
        .expect("Failed to read fixture");
    let frames: Vec<LandmarkFrame> = contents
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match ReplayRecord::parse(line, i + 1) {
            Ok(Some(ReplayRecord::Frame(frame))) => Some(frame),
            _ => None,
        })
        .collect();

    controller.on_frame(&frames[0], 0).expect("Calibration frame rejected");
    let second_epoch = controller.select_exercise(ExerciseId::Squat);
    assert!(second_epoch > first_epoch);

    // A deep squat produced before the reselection arrives late
    let mut late = frames[4].clone();
    late.epoch = Some(first_epoch);
    let result = controller.on_frame(&late, 140).expect("Frame rejected");

    assert!(result.stale);
    assert!(!result.calibrated);
    assert_eq!(result.rep_count, 0);
}
