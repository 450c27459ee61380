//! Append-only CSV record of finished sessions, plus the leaderboard read
//! back from it.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use crate::{error::StorageError, session::SessionRecord};

pub const MAX_STORED_SCORE: u32 = 999_999;

pub trait SessionSink {
    fn save(&self, record: &SessionRecord) -> Result<(), StorageError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub timestamp: String,
    pub name: String,
    pub high_score: u32,
}

pub struct CsvStore {
    path: PathBuf,
    max_tries: u32,
}

impl CsvStore {
    pub fn open(path: impl Into<PathBuf>, max_tries: u32) -> Result<Self, StorageError> {
        let store = Self {
            path: path.into(),
            max_tries,
        };
        if !store.path.exists() {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| store.io_error(source))?;
            }
            let mut writer =
                csv::Writer::from_path(&store.path).map_err(|source| store.csv_error(source))?;
            writer
                .write_record(headers(max_tries))
                .map_err(|source| store.csv_error(source))?;
            writer.flush().map_err(|source| store.io_error(source))?;
            log::info!("created score file {}", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Top `top_n` rows by high score, best first. A missing file is an empty
    /// leaderboard; unreadable scores count as 0.
    pub fn leaderboard(&self, top_n: usize) -> Result<Vec<LeaderboardEntry>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader =
            csv::Reader::from_path(&self.path).map_err(|source| self.csv_error(source))?;
        let header = reader
            .headers()
            .map_err(|source| self.csv_error(source))?
            .clone();
        let column = |name: &str| header.iter().position(|h| h == name);
        let (Some(name_col), Some(score_col)) = (column("Name"), column("High_Score")) else {
            log::warn!("{} has no Name/High_Score columns", self.path.display());
            return Ok(Vec::new());
        };
        let time_col = column("Timestamp");

        let mut entries = Vec::new();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    log::warn!("skipping malformed row in {}: {err}", self.path.display());
                    continue;
                }
            };
            entries.push(LeaderboardEntry {
                timestamp: time_col
                    .and_then(|c| row.get(c))
                    .unwrap_or_default()
                    .to_string(),
                name: row.get(name_col).unwrap_or_default().to_string(),
                high_score: row
                    .get(score_col)
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .map(clamp_score)
                    .unwrap_or(0),
            });
        }

        entries.sort_by(|a, b| b.high_score.cmp(&a.high_score));
        entries.truncate(top_n);
        Ok(entries)
    }

    fn row(&self, record: &SessionRecord) -> Vec<String> {
        let player = &record.player;
        let mut row = vec![
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            sanitize_cell(&player.name),
            sanitize_cell(&player.email),
            sanitize_cell(&player.phone),
            if player.contact_permission { "Yes" } else { "No" }.to_string(),
        ];
        for n in 0..self.max_tries as usize {
            let score = record
                .attempts
                .get(n)
                .and_then(|a| a.score)
                .map(|s| clamp_score(s as i64))
                .unwrap_or(0);
            row.push(score.to_string());
        }
        row.push(clamp_score(record.high_score() as i64).to_string());
        row
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StorageError {
        StorageError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionSink for CsvStore {
    fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(self.row(record))
            .map_err(|source| self.csv_error(source))?;
        writer.flush().map_err(|source| self.io_error(source))?;

        log::info!(
            "saved session for {}: scores {:?}, high score {}",
            record.player.name,
            record.scores(),
            record.high_score()
        );
        Ok(())
    }
}

pub fn headers(max_tries: u32) -> Vec<String> {
    let mut headers: Vec<String> = ["Timestamp", "Name", "Email", "Phone", "Contact_Permission"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    headers.extend((1..=max_tries).map(|n| format!("Try_{n}_Score")));
    headers.push("High_Score".to_string());
    headers
}

/// Strips control characters and defuses spreadsheet formulas.
pub fn sanitize_cell(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    if cleaned.starts_with(['=', '+', '-', '@']) {
        format!("'{cleaned}")
    } else {
        cleaned
    }
}

pub fn clamp_score(score: i64) -> u32 {
    score.clamp(0, MAX_STORED_SCORE as i64) as u32
}
