//! Per-player session: start gesture, gameplay control, and attempt bookkeeping.

use crate::{
    config::{GestureConfig, ScoreEntryMode, SessionConfig},
    error::EntryError,
    gesture::{self, GestureClassifier},
    monitor::{GameOverReason, ScoreMonitor},
    types::{Command, GestureReading, LandmarkFrame, Lane, Posture},
};

const CENTER_LANE: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub contact_permission: bool,
}

impl Player {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: String::new(),
            phone: String::new(),
            contact_permission: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptRecord {
    pub number: u32,
    pub score: Option<u32>,
    pub ended_by: Option<GameOverReason>,
}

impl AttemptRecord {
    fn started(number: u32) -> Self {
        Self {
            number,
            score: None,
            ended_by: None,
        }
    }

    fn finalize(self, score: u32, ended_by: Option<GameOverReason>) -> Self {
        Self {
            score: Some(score),
            ended_by,
            ..self
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub player: Player,
    pub max_tries: u32,
    pub attempts: Vec<AttemptRecord>,
}

impl SessionRecord {
    pub fn new(player: Player, max_tries: u32) -> Self {
        Self {
            player,
            max_tries,
            attempts: Vec::new(),
        }
    }

    pub fn high_score(&self) -> u32 {
        self.attempts
            .iter()
            .filter_map(|a| a.score)
            .max()
            .unwrap_or(0)
    }

    pub fn scores(&self) -> Vec<u32> {
        self.attempts.iter().filter_map(|a| a.score).collect()
    }
}

pub trait ScoreEntry {
    /// Blocks until the operator answers. `Ok(None)` means the prompt was
    /// dismissed without a value.
    fn request_manual_score(&self, attempt: u32, player_name: &str)
    -> Result<Option<u32>, EntryError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingStart,
    Playing { attempt: u32 },
    /// Lasts one tick, then the session waits for the next start gesture.
    AttemptComplete { attempt: u32, score: u32 },
    SessionComplete,
    Exited,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::SessionComplete | SessionState::Exited)
    }
}

pub struct SessionMachine {
    config: SessionConfig,
    classifier: GestureClassifier,
    monitor: ScoreMonitor,
    entry: Box<dyn ScoreEntry>,
    record: SessionRecord,
    state: SessionState,
    hold_frames: u32,
    calibration_y: Option<i32>,
    // 0 = left, 1 = center, 2 = right
    lane_index: u8,
    // Direction of the last lane command sent this attempt.
    last_move: Option<Lane>,
    // -1 = crouch, 0 = stand, 1 = jump
    vertical: i8,
    active: Option<AttemptRecord>,
    last_reading: Option<GestureReading>,
}

impl SessionMachine {
    pub fn new(
        config: SessionConfig,
        gesture: &GestureConfig,
        monitor: ScoreMonitor,
        entry: Box<dyn ScoreEntry>,
        player: Player,
    ) -> Self {
        let record = SessionRecord::new(player, config.max_tries);
        Self {
            classifier: GestureClassifier::new(gesture),
            config,
            monitor,
            entry,
            record,
            state: SessionState::AwaitingStart,
            hold_frames: 0,
            calibration_y: None,
            lane_index: CENTER_LANE,
            last_move: None,
            vertical: 0,
            active: None,
            last_reading: None,
        }
    }

    /// Advances the session by one video frame. `landmarks` is `None` when no
    /// body was detected.
    pub fn tick(&mut self, landmarks: Option<&LandmarkFrame>) -> Vec<Command> {
        let mut commands = Vec::new();

        if let SessionState::AttemptComplete { .. } = self.state {
            self.state = SessionState::AwaitingStart;
        }

        let reading = landmarks.map(|l| self.classifier.classify(l));
        self.last_reading = reading;

        let state = self.state;
        match state {
            SessionState::AwaitingStart => match (landmarks, reading) {
                (Some(landmarks), Some(reading)) => {
                    self.await_start(landmarks, reading, &mut commands)
                }
                _ => self.hold_frames = 0,
            },
            SessionState::Playing { attempt } => {
                if self.monitor.is_game_over() {
                    self.finish_attempt(attempt);
                } else if let Some(reading) = reading {
                    self.steer(reading, &mut commands);
                }
            }
            SessionState::AttemptComplete { .. }
            | SessionState::SessionComplete
            | SessionState::Exited => {}
        }

        commands
    }

    pub fn signal_manual_game_over(&self) {
        match self.state {
            SessionState::Playing { .. } => self.monitor.signal_manual_game_over(),
            state => log::debug!("ignoring manual game over in state {state:?}"),
        }
    }

    pub fn signal_exit(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(attempt) = self.active.take() {
            log::info!("exit requested; discarding try {}", attempt.number);
        }
        self.monitor.stop();
        self.monitor.reset();
        self.state = SessionState::Exited;
    }

    pub fn current_state(&self) -> SessionState {
        self.state
    }

    pub fn final_session_record(&self) -> Option<&SessionRecord> {
        self.state.is_terminal().then_some(&self.record)
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn calibration(&self) -> Option<i32> {
        self.calibration_y
    }

    pub fn attempts_started(&self) -> u32 {
        self.record.attempts.len() as u32 + u32::from(self.active.is_some())
    }

    pub fn lane(&self) -> u8 {
        self.lane_index
    }

    pub fn last_move(&self) -> Option<Lane> {
        self.last_move
    }

    pub fn last_reading(&self) -> Option<GestureReading> {
        self.last_reading
    }

    pub fn monitor(&self) -> &ScoreMonitor {
        &self.monitor
    }

    fn await_start(
        &mut self,
        landmarks: &LandmarkFrame,
        reading: GestureReading,
        commands: &mut Vec<Command>,
    ) {
        if !reading.hands_joined {
            self.hold_frames = 0;
            return;
        }

        self.hold_frames += 1;
        if self.hold_frames < self.config.start_hold_frames {
            return;
        }
        self.hold_frames = 0;

        if self.attempts_started() < self.config.max_tries {
            self.start_attempt(landmarks, commands);
        }
    }

    fn start_attempt(&mut self, landmarks: &LandmarkFrame, commands: &mut Vec<Command>) {
        let number = self.attempts_started() + 1;
        log::info!(
            "starting try {number}/{} for {}",
            self.config.max_tries,
            self.record.player.name
        );

        if self.calibration_y.is_none() {
            self.calibration_y = gesture::shoulder_mid_y(landmarks);
            if let Some(y) = self.calibration_y {
                log::info!("calibrated shoulder line at y={y}");
            }
        }

        commands.push(if number == 1 {
            Command::Click {
                x: self.config.start_click_x,
                y: self.config.start_click_y,
            }
        } else {
            Command::Resume
        });

        self.monitor.start();
        self.lane_index = CENTER_LANE;
        self.last_move = None;
        self.vertical = 0;
        self.active = Some(AttemptRecord::started(number));
        self.state = SessionState::Playing { attempt: number };
    }

    fn steer(&mut self, reading: GestureReading, commands: &mut Vec<Command>) {
        match reading.lane {
            Some(Lane::Left) if self.lane_index > 0 => {
                commands.push(Command::MoveLeft);
                self.lane_index -= 1;
                self.last_move = Some(Lane::Left);
            }
            Some(Lane::Right) if self.lane_index < 2 => {
                commands.push(Command::MoveRight);
                self.lane_index += 1;
                self.last_move = Some(Lane::Right);
            }
            Some(Lane::Center) => self.lane_index = CENTER_LANE,
            _ => {}
        }

        // Edge-triggered: only a transition out of standing emits.
        match (reading.posture, self.vertical) {
            (Some(Posture::Jump), 0) => {
                commands.push(Command::Jump);
                self.vertical = 1;
            }
            (Some(Posture::Crouch), 0) => {
                commands.push(Command::Crouch);
                self.vertical = -1;
            }
            (Some(Posture::Stand), v) if v != 0 => self.vertical = 0,
            _ => {}
        }
    }

    fn finish_attempt(&mut self, number: u32) {
        self.monitor.stop();
        let reason = self.monitor.game_over_reason();
        let mut score = self.monitor.final_score();

        let ask_operator = match self.config.score_entry {
            ScoreEntryMode::Always => true,
            ScoreEntryMode::Operator => reason == Some(GameOverReason::Manual),
            ScoreEntryMode::Never => false,
        };
        if ask_operator {
            match self
                .entry
                .request_manual_score(number, &self.record.player.name)
            {
                Ok(Some(entered)) => {
                    log::info!("manual score entered for try {number}: {entered}");
                    score = entered;
                }
                Ok(None) => {
                    log::info!("score entry dismissed for try {number}; recording 0");
                    score = 0;
                }
                Err(err) => {
                    log::warn!("manual score entry failed: {err}; keeping {score}");
                }
            }
        }

        let attempt = self
            .active
            .take()
            .unwrap_or_else(|| AttemptRecord::started(number))
            .finalize(score, reason);
        log::info!(
            "try {number} completed: score {score} ({})",
            reason.map(|r| r.label()).unwrap_or("unknown")
        );
        self.record.attempts.push(attempt);

        self.monitor.reset();
        self.lane_index = CENTER_LANE;
        self.last_move = None;
        self.vertical = 0;
        self.hold_frames = 0;

        self.state = if self.record.attempts.len() as u32 >= self.config.max_tries {
            log::info!(
                "session complete for {}: high score {}",
                self.record.player.name,
                self.record.high_score()
            );
            SessionState::SessionComplete
        } else {
            SessionState::AttemptComplete {
                attempt: number,
                score,
            }
        };
    }
}
