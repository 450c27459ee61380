use std::{collections::VecDeque, process::Command};

use parking_lot::Mutex;

use crate::monitor::ScoreSampler;

pub struct CommandSampler {
    program: String,
    args: Vec<String>,
}

impl CommandSampler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ScoreSampler for CommandSampler {
    fn sample(&self) -> Option<i64> {
        let output = match Command::new(&self.program).args(&self.args).output() {
            Ok(output) => output,
            Err(err) => {
                log::debug!("score sampler {} failed to run: {err}", self.program);
                return None;
            }
        };
        if !output.status.success() {
            return None;
        }
        parse_score(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Keeps only the digits of recognized text. OCR output is noisy, so
/// separators and stray characters are dropped rather than rejected.
pub fn parse_score(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

pub struct NullSampler;

impl ScoreSampler for NullSampler {
    fn sample(&self) -> Option<i64> {
        None
    }
}

pub struct SequenceSampler {
    samples: Mutex<VecDeque<Option<i64>>>,
    fallback: Option<i64>,
}

impl SequenceSampler {
    pub fn new(samples: impl IntoIterator<Item = Option<i64>>) -> Self {
        Self {
            samples: Mutex::new(samples.into_iter().collect()),
            fallback: None,
        }
    }

    pub fn repeating(sample: Option<i64>) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            fallback: sample,
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.lock().len()
    }
}

impl ScoreSampler for SequenceSampler {
    fn sample(&self) -> Option<i64> {
        self.samples.lock().pop_front().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_score_keeps_digits() {
        assert_eq!(parse_score("1,250\n"), Some(1250));
        assert_eq!(parse_score(" 00042 "), Some(42));
        assert_eq!(parse_score("SCORE"), None);
        assert_eq!(parse_score(""), None);
    }

    #[test]
    fn parse_score_rejects_overflow() {
        assert_eq!(parse_score("99999999999999999999999"), None);
    }

    #[test]
    fn sequence_sampler_drains_then_falls_back() {
        let sampler = SequenceSampler::new([Some(1), None, Some(3)]);
        assert_eq!(sampler.remaining(), 3);
        assert_eq!(sampler.sample(), Some(1));
        assert_eq!(sampler.sample(), None);
        assert_eq!(sampler.sample(), Some(3));
        assert_eq!(sampler.sample(), None);

        let sampler = SequenceSampler::repeating(Some(7));
        assert_eq!(sampler.sample(), Some(7));
        assert_eq!(sampler.sample(), Some(7));
    }

    #[test]
    fn missing_program_is_no_sample() {
        let sampler = CommandSampler::new("definitely-not-a-real-ocr-tool", Vec::new());
        assert_eq!(sampler.sample(), None);
    }
}
