use std::process::Command as Process;

use crate::types::Command;

pub trait CommandSink {
    fn emit(&self, command: Command);
}

/// Sends key presses and clicks through an xdotool-compatible program.
pub struct XdotoolSink {
    program: String,
}

impl XdotoolSink {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

pub fn xdotool_args(command: Command) -> Vec<String> {
    let key = |name: &str| vec!["key".to_string(), name.to_string()];
    match command {
        Command::MoveLeft => key("Left"),
        Command::MoveRight => key("Right"),
        Command::Jump => key("Up"),
        Command::Crouch => key("Down"),
        Command::Resume => key("space"),
        Command::Click { x, y } => vec![
            "mousemove".to_string(),
            x.to_string(),
            y.to_string(),
            "click".to_string(),
            "1".to_string(),
        ],
    }
}

impl CommandSink for XdotoolSink {
    fn emit(&self, command: Command) {
        let args = xdotool_args(command);
        match Process::new(&self.program).args(&args).status() {
            Ok(status) if status.success() => log::debug!("sent {command:?}"),
            Ok(status) => log::warn!("{} {:?} exited with {status}", self.program, args),
            Err(err) => log::warn!("failed to run {} for {command:?}: {err}", self.program),
        }
    }
}

pub struct DryRunSink;

impl CommandSink for DryRunSink {
    fn emit(&self, command: Command) {
        log::info!("command: {command:?}");
    }
}
