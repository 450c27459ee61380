//! Background score polling and game-over detection.
//!
//! A poll thread samples the on-screen score at a fixed interval and keeps the
//! running maximum. The attempt is declared over when the score stops
//! changing for the configured freeze duration, when the sampler keeps failing
//! until the hard timeout, or when the operator signals it. The game-over flag
//! is latched: once set it stays set until [`ScoreMonitor::reset`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use parking_lot::Mutex;

use crate::config::MonitorConfig;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub trait ScoreSampler: Send + Sync + 'static {
    /// One reading. `None` for any capture or recognition failure; such
    /// failures are expected and only count toward the timeout.
    fn sample(&self) -> Option<i64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOverReason {
    ScoreFrozen,
    SamplerTimeout,
    Manual,
}

impl GameOverReason {
    pub fn label(&self) -> &'static str {
        match self {
            GameOverReason::ScoreFrozen => "score frozen",
            GameOverReason::SamplerTimeout => "score unreadable",
            GameOverReason::Manual => "operator",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Monitoring,
    GameOver,
}

#[derive(Debug, Default)]
struct MonitorState {
    current: Option<u32>,
    last: u32,
    max: u32,
    no_change: u32,
    failures: u32,
    reason: Option<GameOverReason>,
}

impl MonitorState {
    /// Applies one poll result. Returns the latch reason if this poll set it.
    /// Does nothing once latched.
    fn record(
        &mut self,
        sample: Option<u32>,
        freeze_polls: u32,
        failure_ceiling: u32,
    ) -> Option<GameOverReason> {
        if self.reason.is_some() {
            return None;
        }

        match sample {
            Some(score) => {
                self.failures = 0;
                self.current = Some(score);
                if score > self.max {
                    self.max = score;
                }
                if score == self.last && self.max > 0 {
                    self.no_change += 1;
                } else {
                    self.no_change = 0;
                    self.last = score;
                }
            }
            None => {
                // The screen most likely still shows the same number.
                self.failures += 1;
                if self.max > 0 {
                    self.no_change += 1;
                }
            }
        }

        if self.no_change >= freeze_polls && self.max > 0 {
            self.reason = Some(GameOverReason::ScoreFrozen);
        } else if self.failures >= failure_ceiling {
            self.reason = Some(GameOverReason::SamplerTimeout);
        }
        self.reason
    }
}

struct Shared {
    state: Mutex<MonitorState>,
    // Mirrors `state.reason.is_some()` so the frame loop can check without locking.
    game_over: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            game_over: AtomicBool::new(false),
        }
    }

    fn latch(&self, reason: GameOverReason) -> bool {
        let mut state = self.state.lock();
        if state.reason.is_some() {
            return false;
        }
        state.reason = Some(reason);
        self.game_over.store(true, Ordering::Release);
        true
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        *state = MonitorState::default();
        self.game_over.store(false, Ordering::Release);
    }
}

struct PollWorker {
    stop_tx: Sender<()>,
    // Disconnects when the poll thread exits.
    done_rx: Receiver<()>,
    handle: thread::JoinHandle<()>,
}

pub struct ScoreMonitor {
    config: MonitorConfig,
    sampler: Arc<dyn ScoreSampler>,
    shared: Arc<Shared>,
    worker: Option<PollWorker>,
}

impl ScoreMonitor {
    pub fn new(config: MonitorConfig, sampler: Arc<dyn ScoreSampler>) -> Self {
        Self {
            config,
            sampler,
            shared: Arc::new(Shared::new()),
            worker: None,
        }
    }

    pub fn start(&mut self) {
        if self.worker.is_some() {
            log::warn!("score monitor already running; restarting");
            self.stop();
        }
        self.shared.clear();

        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let shared = self.shared.clone();
        let sampler = self.sampler.clone();
        let settings = PollSettings {
            interval: self.config.poll_interval(),
            freeze_polls: self.config.freeze_polls(),
            failure_ceiling: self.config.failure_ceiling(),
        };

        let handle = thread::spawn(move || {
            let _done = done_tx;
            poll_loop(shared, sampler, settings, stop_rx);
        });

        log::info!(
            "score monitoring started (poll {:?}, freeze after {} polls, timeout after {} failures)",
            settings.interval,
            settings.freeze_polls,
            settings.failure_ceiling
        );

        self.worker = Some(PollWorker {
            stop_tx,
            done_rx,
            handle,
        });
    }

    /// Stops polling. Waits at most `stop_timeout` for the poll thread; a
    /// sample still in flight is discarded.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        // The thread may already have exited after latching.
        let _ = worker.stop_tx.try_send(());

        match worker.done_rx.recv_timeout(self.config.stop_timeout()) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "score monitor did not stop within {:?}; detaching poll thread",
                    self.config.stop_timeout()
                );
            }
            _ => {
                if worker.handle.join().is_err() {
                    log::warn!("score monitor thread panicked");
                }
            }
        }

        log::info!("score monitoring stopped, final score {}", self.final_score());
    }

    pub fn signal_manual_game_over(&self) {
        if self.shared.latch(GameOverReason::Manual) {
            log::info!("manual game-over signal");
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.shared.game_over.load(Ordering::Acquire)
    }

    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        self.shared.state.lock().reason
    }

    pub fn final_score(&self) -> u32 {
        self.shared.state.lock().max
    }

    pub fn current_sample(&self) -> Option<u32> {
        self.shared.state.lock().current
    }

    /// Clears counters and the latch. Leaves the polling on/off state alone,
    /// but a running poll thread is stopped first so it cannot race the reset.
    pub fn reset(&mut self) {
        if self.worker.is_some() {
            log::warn!("score monitor reset while running; stopping it first");
            self.stop();
        }
        self.shared.clear();
    }

    pub fn phase(&self) -> MonitorPhase {
        if self.is_game_over() {
            MonitorPhase::GameOver
        } else if self.worker.is_some() {
            MonitorPhase::Monitoring
        } else {
            MonitorPhase::Idle
        }
    }
}

impl Drop for ScoreMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone, Copy)]
struct PollSettings {
    interval: Duration,
    freeze_polls: u32,
    failure_ceiling: u32,
}

fn poll_loop(
    shared: Arc<Shared>,
    sampler: Arc<dyn ScoreSampler>,
    settings: PollSettings,
    stop_rx: Receiver<()>,
) {
    let mut last_report = Instant::now();

    loop {
        let raw = sampler.sample();

        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }

        // Negative readings are garbage, same as no reading.
        let sample = raw.and_then(|s| u32::try_from(s).ok());

        let latched = {
            let mut state = shared.state.lock();
            if state.reason.is_some() {
                break;
            }
            let latched = state.record(sample, settings.freeze_polls, settings.failure_ceiling);
            if latched.is_some() {
                shared.game_over.store(true, Ordering::Release);
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                log::debug!(
                    "score monitor: sample={:?} current={:?} max={} freeze={}/{} failures={}",
                    raw,
                    state.current,
                    state.max,
                    state.no_change,
                    settings.freeze_polls,
                    state.failures
                );
                last_report = Instant::now();
            }

            latched.map(|reason| (reason, state.max, state.no_change, state.failures))
        };

        if let Some((reason, max, no_change, failures)) = latched {
            match reason {
                GameOverReason::ScoreFrozen => log::info!(
                    "game over detected: score frozen at {max} for {no_change} polls"
                ),
                GameOverReason::SamplerTimeout => log::info!(
                    "game over detected: score unreadable for {failures} consecutive polls"
                ),
                GameOverReason::Manual => {}
            }
            break;
        }

        match stop_rx.recv_timeout(settings.interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SequenceSampler;

    fn fast_config(freeze_polls: u64, failure_ceiling: u64) -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: 1,
            freeze_duration_ms: freeze_polls,
            timeout_ms: failure_ceiling,
            stop_timeout_ms: 1_000,
        }
    }

    fn feed(state: &mut MonitorState, samples: &[Option<u32>]) -> Option<GameOverReason> {
        let mut latched = None;
        for sample in samples {
            if let Some(reason) = state.record(*sample, 3, 10) {
                latched = Some(reason);
            }
        }
        latched
    }

    fn wait_for_game_over(monitor: &ScoreMonitor) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if monitor.is_game_over() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn repeated_positive_score_latches_after_freeze_polls() {
        let mut state = MonitorState::default();
        assert_eq!(feed(&mut state, &[Some(40), Some(40), Some(40)]), None);
        assert_eq!(
            feed(&mut state, &[Some(40)]),
            Some(GameOverReason::ScoreFrozen)
        );
        assert_eq!(state.max, 40);
    }

    #[test]
    fn latch_holds_and_blocks_new_maximum() {
        let mut state = MonitorState::default();
        feed(&mut state, &[Some(10), Some(10), Some(10), Some(10)]);
        assert_eq!(state.reason, Some(GameOverReason::ScoreFrozen));

        assert_eq!(state.record(Some(999), 3, 10), None);
        assert_eq!(state.max, 10);
        assert_eq!(state.reason, Some(GameOverReason::ScoreFrozen));
    }

    #[test]
    fn changing_score_resets_freeze_counter() {
        let mut state = MonitorState::default();
        feed(&mut state, &[Some(10), Some(10), Some(10), Some(20), Some(20)]);
        assert_eq!(state.reason, None);
        assert_eq!(state.no_change, 1);
    }

    #[test]
    fn zero_score_never_freezes() {
        let mut state = MonitorState::default();
        let zeros = vec![Some(0); 9];
        assert_eq!(feed(&mut state, &zeros), None);
    }

    #[test]
    fn failures_count_as_no_change_once_scoring() {
        let mut state = MonitorState::default();
        assert_eq!(
            feed(&mut state, &[Some(75), None, None, None]),
            Some(GameOverReason::ScoreFrozen)
        );
        assert_eq!(state.max, 75);
    }

    #[test]
    fn failures_without_score_hit_the_ceiling() {
        let mut state = MonitorState::default();
        let misses = vec![None; 9];
        assert_eq!(feed(&mut state, &misses), None);
        assert_eq!(feed(&mut state, &[None]), Some(GameOverReason::SamplerTimeout));
        assert_eq!(state.max, 0);
    }

    #[test]
    fn valid_sample_resets_failure_counter() {
        let mut state = MonitorState::default();
        let mut samples = vec![None; 9];
        samples.push(Some(0));
        samples.extend(vec![None; 9]);
        assert_eq!(feed(&mut state, &samples), None);
        assert_eq!(state.failures, 9);
    }

    #[test]
    fn freeze_after_rising_sequence_reports_peak() {
        let sampler = Arc::new(SequenceSampler::new([10, 50, 200, 200, 200, 200, 200].map(Some)));
        let mut monitor = ScoreMonitor::new(fast_config(3, 10_000), sampler);
        monitor.start();
        assert!(wait_for_game_over(&monitor));
        monitor.stop();

        assert_eq!(monitor.final_score(), 200);
        assert_eq!(monitor.game_over_reason(), Some(GameOverReason::ScoreFrozen));
        assert_eq!(monitor.phase(), MonitorPhase::GameOver);
    }

    #[test]
    fn all_absent_samples_time_out_with_zero_score() {
        let sampler = Arc::new(SequenceSampler::new(Vec::new()));
        let mut monitor = ScoreMonitor::new(fast_config(3, 5), sampler);
        monitor.start();
        assert!(wait_for_game_over(&monitor));
        monitor.stop();

        assert_eq!(monitor.final_score(), 0);
        assert_eq!(monitor.game_over_reason(), Some(GameOverReason::SamplerTimeout));
    }

    #[test]
    fn negative_samples_are_treated_as_absent() {
        let sampler = Arc::new(SequenceSampler::new(vec![Some(-5); 50]));
        let mut monitor = ScoreMonitor::new(fast_config(3, 5), sampler);
        monitor.start();
        assert!(wait_for_game_over(&monitor));
        monitor.stop();

        assert_eq!(monitor.final_score(), 0);
        assert_eq!(monitor.current_sample(), None);
        assert_eq!(monitor.game_over_reason(), Some(GameOverReason::SamplerTimeout));
    }

    #[test]
    fn manual_signal_is_visible_immediately() {
        let sampler = Arc::new(SequenceSampler::repeating(Some(1)));
        let mut monitor = ScoreMonitor::new(fast_config(1_000_000, 1_000_000), sampler);
        monitor.start();
        assert!(!monitor.is_game_over());

        monitor.signal_manual_game_over();
        assert!(monitor.is_game_over());
        assert_eq!(monitor.game_over_reason(), Some(GameOverReason::Manual));

        monitor.stop();
        assert!(monitor.is_game_over());
    }

    #[test]
    fn manual_signal_works_while_idle() {
        let sampler = Arc::new(SequenceSampler::new(Vec::new()));
        let monitor = ScoreMonitor::new(MonitorConfig::default(), sampler);
        assert_eq!(monitor.phase(), MonitorPhase::Idle);
        monitor.signal_manual_game_over();
        assert_eq!(monitor.phase(), MonitorPhase::GameOver);
    }

    #[test]
    fn running_monitor_reports_live_readings() {
        let sampler = Arc::new(SequenceSampler::repeating(Some(7)));
        let mut monitor = ScoreMonitor::new(fast_config(1_000_000, 1_000_000), sampler);
        monitor.start();
        assert_eq!(monitor.phase(), MonitorPhase::Monitoring);

        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.current_sample().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(monitor.current_sample(), Some(7));

        monitor.stop();
        assert_eq!(monitor.phase(), MonitorPhase::Idle);
        assert_eq!(monitor.final_score(), 7);
    }

    #[test]
    fn reset_clears_latch_and_score() {
        let sampler = Arc::new(SequenceSampler::new([30, 30, 30, 30, 30].map(Some)));
        let mut monitor = ScoreMonitor::new(fast_config(2, 10_000), sampler);
        monitor.start();
        assert!(wait_for_game_over(&monitor));
        monitor.stop();
        assert_eq!(monitor.final_score(), 30);

        monitor.reset();
        assert!(!monitor.is_game_over());
        assert_eq!(monitor.final_score(), 0);
        assert_eq!(monitor.game_over_reason(), None);
        assert_eq!(monitor.phase(), MonitorPhase::Idle);
    }

    #[test]
    fn stop_is_bounded_by_a_stuck_sampler() {
        struct Stuck;
        impl ScoreSampler for Stuck {
            fn sample(&self) -> Option<i64> {
                thread::sleep(Duration::from_millis(500));
                Some(10)
            }
        }

        let mut monitor = ScoreMonitor::new(
            MonitorConfig {
                poll_interval_ms: 1,
                freeze_duration_ms: 1_000,
                timeout_ms: 1_000,
                stop_timeout_ms: 20,
            },
            Arc::new(Stuck),
        );
        monitor.start();
        thread::sleep(Duration::from_millis(5));

        let started = Instant::now();
        monitor.stop();
        assert!(started.elapsed() < Duration::from_millis(400));
        // The in-flight reading is discarded.
        assert_eq!(monitor.final_score(), 0);
    }

    #[test]
    fn stop_twice_and_stop_before_start_are_harmless() {
        let sampler = Arc::new(SequenceSampler::new(Vec::new()));
        let mut monitor = ScoreMonitor::new(fast_config(3, 5), sampler);
        monitor.stop();
        monitor.start();
        assert!(wait_for_game_over(&monitor));
        monitor.stop();
        monitor.stop();
        assert_eq!(monitor.phase(), MonitorPhase::GameOver);
    }
}
