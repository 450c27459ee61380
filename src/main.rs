use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use gesture_booth::{
    config::{BoothConfig, InputConfig, PoseConfig, ScoreConfig},
    control::{CommandSink, DryRunSink, XdotoolSink},
    monitor::{MonitorPhase, ScoreMonitor, ScoreSampler},
    operator::{Console, OperatorSignal},
    pipeline::{PoseSource, replay::ReplayPoseSource},
    sampler::{CommandSampler, NullSampler},
    session::{Player, SessionMachine, SessionRecord, SessionState},
    storage::{CsvStore, SessionSink},
};

const DEFAULT_CONFIG_PATH: &str = "booth.toml";

fn main() -> Result<()> {
    env_logger::init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = BoothConfig::load_or_default(&config_path)?;

    let sink = build_sink(&config.input);
    let sampler = build_sampler(&config.score);
    let store = CsvStore::open(&config.storage.csv_path, config.session.max_tries)?;
    log::info!("scores are saved to {}", store.path().display());
    let console = Console::stdin()?;
    let mut input = open_pose_input(&config.pose)?;

    print_leaderboard(&store, config.storage.leaderboard_top_n);

    while let Some(player) = console.next_player() {
        let outcome = run_session(
            &config,
            player,
            sampler.clone(),
            &console,
            sink.as_ref(),
            input.source.as_mut(),
        );

        if let Err(err) = store.save(&outcome.record) {
            log::error!("failed to save session: {err}");
        }
        print_summary(&outcome.record);
        print_leaderboard(&store, config.storage.leaderboard_top_n);

        if outcome.source_ended {
            log::warn!("pose source ended; shutting down");
            break;
        }
    }

    log::info!("booth closed");
    Ok(())
}

struct SessionOutcome {
    record: SessionRecord,
    source_ended: bool,
}

fn run_session(
    config: &BoothConfig,
    player: Player,
    sampler: Arc<dyn ScoreSampler>,
    console: &Console,
    sink: &dyn CommandSink,
    source: &mut dyn PoseSource,
) -> SessionOutcome {
    let monitor = ScoreMonitor::new(config.monitor.clone(), sampler);
    let mut session = SessionMachine::new(
        config.session.clone(),
        &config.gesture,
        monitor,
        Box::new(console.clone()),
        player,
    );
    println!(
        "{}: hold your hands together to start. Type 'g' + Enter for game over, 'q' to end.",
        session.record().player.name
    );

    let mut last_state = session.current_state();
    let mut source_ended = false;
    let mut last_pose = None;
    let mut last_score = None;

    while !session.current_state().is_terminal() {
        match console.poll_signal() {
            Some(OperatorSignal::GameOver) => session.signal_manual_game_over(),
            Some(OperatorSignal::Exit) => {
                session.signal_exit();
                break;
            }
            None => {}
        }

        let Some(pose) = source.next_frame() else {
            session.signal_exit();
            source_ended = true;
            break;
        };

        for command in session.tick(pose.landmarks.as_ref()) {
            sink.emit(command);
        }

        let reading = session.last_reading();
        let pose_label = reading.map(|r| (r.lane, r.posture));
        if pose_label != last_pose {
            if let Some(reading) = reading {
                log::debug!(
                    "pose: {} / {} (wrists {:?}px apart, lane {}, last move {})",
                    reading.lane.map(|l| l.label()).unwrap_or("?"),
                    reading.posture.map(|p| p.label()).unwrap_or("?"),
                    reading.distance,
                    session.lane(),
                    session.last_move().map(|l| l.label()).unwrap_or("-")
                );
            }
            last_pose = pose_label;
        }

        if session.monitor().phase() == MonitorPhase::Monitoring {
            let score = session.monitor().current_sample();
            if score.is_some() && score != last_score {
                println!("  score {}", score.unwrap_or_default());
            }
            last_score = score.or(last_score);
        } else {
            last_score = None;
        }

        let state = session.current_state();
        if state != last_state {
            announce(state, config.session.max_tries);
            last_state = state;
        }
    }

    let record = session
        .final_session_record()
        .unwrap_or_else(|| session.record())
        .clone();
    SessionOutcome {
        record,
        source_ended,
    }
}

fn announce(state: SessionState, max_tries: u32) {
    match state {
        SessionState::Playing { attempt } => println!("Try {attempt}/{max_tries} started."),
        SessionState::AttemptComplete { attempt, score } => {
            println!("Try {attempt} over, score {score}. Hands together for the next try.")
        }
        SessionState::SessionComplete => println!("All tries done."),
        SessionState::Exited => println!("Session ended by operator."),
        SessionState::AwaitingStart => {}
    }
}

fn print_summary(record: &SessionRecord) {
    println!();
    println!("--- {} ---", record.player.name);
    for attempt in &record.attempts {
        println!(
            "  Try {}: {}",
            attempt.number,
            attempt.score.unwrap_or_default()
        );
    }
    println!("  High score: {}", record.high_score());
}

fn print_leaderboard(store: &CsvStore, top_n: usize) {
    match store.leaderboard(top_n) {
        Ok(entries) if entries.is_empty() => println!("Leaderboard is empty."),
        Ok(entries) => {
            println!("=== Top {top_n} ===");
            for (rank, entry) in entries.iter().enumerate() {
                println!("{:>2}. {:<20} {:>7}", rank + 1, entry.name, entry.high_score);
            }
        }
        Err(err) => log::warn!("failed to read leaderboard: {err}"),
    }
}

fn build_sink(config: &InputConfig) -> Box<dyn CommandSink> {
    if config.dry_run {
        log::info!("dry run: commands are logged, not sent");
        Box::new(DryRunSink)
    } else {
        Box::new(XdotoolSink::new(config.program.clone()))
    }
}

fn build_sampler(config: &ScoreConfig) -> Arc<dyn ScoreSampler> {
    match &config.sampler_program {
        Some(program) => Arc::new(CommandSampler::new(program.clone(), config.sampler_args.clone())),
        None => {
            log::info!("no score sampler configured; tries end by operator or timeout");
            Arc::new(NullSampler)
        }
    }
}

struct PoseInput {
    source: Box<dyn PoseSource>,
    #[cfg(feature = "camera-nokhwa")]
    _camera: Option<gesture_booth::pipeline::camera::CameraStream>,
}

fn open_pose_input(config: &PoseConfig) -> Result<PoseInput> {
    if let Some(path) = &config.replay_path {
        let source = ReplayPoseSource::open(path, Duration::from_millis(config.replay_frame_ms))?;
        return Ok(PoseInput {
            source: Box::new(source),
            #[cfg(feature = "camera-nokhwa")]
            _camera: None,
        });
    }
    open_camera_input(config)
}

#[cfg(feature = "camera-nokhwa")]
fn open_camera_input(config: &PoseConfig) -> Result<PoseInput> {
    use anyhow::Context;
    use crossbeam_channel::bounded;
    use gesture_booth::pipeline::{
        ChannelPoseSource, camera::start_camera_stream, helper::HelperEngine, start_pose_worker,
    };

    let engine = HelperEngine::spawn(&config.helper_program, &config.helper_args)?;
    let (frame_tx, frame_rx) = bounded(1);
    let (result_tx, result_rx) = bounded(1);
    start_pose_worker(engine, frame_rx, result_tx)?;
    let camera = start_camera_stream(config, frame_tx).context("failed to start camera")?;

    Ok(PoseInput {
        source: Box::new(ChannelPoseSource::new(result_rx)),
        _camera: Some(camera),
    })
}

#[cfg(not(feature = "camera-nokhwa"))]
fn open_camera_input(_config: &PoseConfig) -> Result<PoseInput> {
    anyhow::bail!("built without camera support; set pose.replay_path to replay landmarks")
}
