use std::{
    io::{self, BufRead, Write},
    thread,
};

use crossbeam_channel::{Receiver, TryRecvError, unbounded};

use crate::{error::EntryError, session::Player, session::ScoreEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorSignal {
    GameOver,
    Exit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreInput {
    Skip,
    Score(u32),
    Invalid,
}

#[derive(Clone)]
pub struct Console {
    lines: Receiver<String>,
}

impl Console {
    pub fn stdin() -> io::Result<Self> {
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("operator-console".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            log::warn!("stdin read failed: {err}");
                            break;
                        }
                    }
                }
                log::debug!("operator console input closed");
            })?;
        Ok(Self { lines: rx })
    }

    pub fn from_lines(lines: Receiver<String>) -> Self {
        Self { lines }
    }

    /// Asks for the next player. `Ok(None)` when the operator ends the event
    /// with an empty name or `quit`.
    pub fn register_player(&self) -> Result<Option<Player>, EntryError> {
        println!();
        println!("=== New player ===");
        let name = self.prompt("Name (blank or 'quit' to stop): ")?;
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("quit") {
            return Ok(None);
        }
        let email = self.prompt_until("Email: ", valid_email, "Invalid email format.")?;
        let phone = self.prompt_until(
            "Phone: ",
            valid_phone,
            "Phone number must have at least 10 digits.",
        )?;
        let permission = self.prompt("May we contact you? [y/N]: ")?;

        Ok(Some(Player {
            name: name.to_string(),
            email,
            phone,
            contact_permission: is_yes(&permission),
        }))
    }

    pub fn next_player(&self) -> Option<Player> {
        match self.register_player() {
            Ok(player) => player,
            Err(err) => {
                log::warn!("stopping registration: {err}");
                None
            }
        }
    }

    pub fn poll_signal(&self) -> Option<OperatorSignal> {
        loop {
            match self.lines.try_recv() {
                Ok(line) => match parse_signal(&line) {
                    Some(signal) => return Some(signal),
                    None => log::debug!("ignoring console input during play: {line:?}"),
                },
                Err(TryRecvError::Empty) => return None,
                // A closed console cannot signal anything; play goes on.
                Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    fn prompt(&self, text: &str) -> Result<String, EntryError> {
        print!("{text}");
        let _ = io::stdout().flush();
        self.lines.recv().map_err(|_| EntryError::ConsoleClosed)
    }

    fn prompt_until(
        &self,
        text: &str,
        valid: fn(&str) -> bool,
        complaint: &str,
    ) -> Result<String, EntryError> {
        loop {
            let answer = self.prompt(text)?;
            let answer = answer.trim();
            if valid(answer) {
                return Ok(answer.to_string());
            }
            println!("{complaint}");
        }
    }

    fn discard_pending(&self) {
        for line in self.lines.try_iter() {
            log::debug!("discarding stale console input {line:?}");
        }
    }
}

impl ScoreEntry for Console {
    fn request_manual_score(
        &self,
        attempt: u32,
        player_name: &str,
    ) -> Result<Option<u32>, EntryError> {
        self.discard_pending();
        loop {
            let line = self.prompt(&format!(
                "Score for {player_name}, try {attempt} (blank to skip): "
            ))?;
            match parse_score_input(&line) {
                ScoreInput::Skip => return Ok(None),
                ScoreInput::Score(score) => return Ok(Some(score)),
                ScoreInput::Invalid => println!("Please enter a whole number, 0 or more."),
            }
        }
    }
}

pub fn parse_signal(line: &str) -> Option<OperatorSignal> {
    match line.trim().to_ascii_lowercase().as_str() {
        "g" | "gameover" | "game over" => Some(OperatorSignal::GameOver),
        "q" | "quit" | "esc" | "exit" => Some(OperatorSignal::Exit),
        _ => None,
    }
}

pub fn parse_score_input(line: &str) -> ScoreInput {
    let text = line.trim();
    if text.is_empty() {
        return ScoreInput::Skip;
    }
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return ScoreInput::Invalid;
    }
    text.parse()
        .map(ScoreInput::Score)
        .unwrap_or(ScoreInput::Invalid)
}

/// `local@domain.tld` with a letters-only top-level domain of two or more
/// characters.
pub fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-".contains(c));
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());
    local_ok && host_ok && tld_ok
}

pub fn valid_phone(phone: &str) -> bool {
    phone.chars().filter(|c| c.is_ascii_digit()).count() >= 10
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::Sender;

    use super::*;

    fn scripted_console(lines: &[&str]) -> (Sender<String>, Console) {
        let (tx, rx) = unbounded();
        for line in lines {
            tx.send(line.to_string()).unwrap();
        }
        (tx, Console::from_lines(rx))
    }

    #[test]
    fn score_input_accepts_non_negative_integers() {
        assert_eq!(parse_score_input("300\n"), ScoreInput::Score(300));
        assert_eq!(parse_score_input("  0 "), ScoreInput::Score(0));
        assert_eq!(parse_score_input(""), ScoreInput::Skip);
        assert_eq!(parse_score_input("-5"), ScoreInput::Invalid);
        assert_eq!(parse_score_input("12a"), ScoreInput::Invalid);
        assert_eq!(parse_score_input("1.5"), ScoreInput::Invalid);
        assert_eq!(parse_score_input("99999999999"), ScoreInput::Invalid);
    }

    #[test]
    fn signals_are_case_insensitive() {
        assert_eq!(parse_signal("G"), Some(OperatorSignal::GameOver));
        assert_eq!(parse_signal(" q "), Some(OperatorSignal::Exit));
        assert_eq!(parse_signal("ESC"), Some(OperatorSignal::Exit));
        assert_eq!(parse_signal("hello"), None);
    }

    #[test]
    fn registration_reads_player_details() {
        let (_tx, console) = scripted_console(&[
            "Ada",
            "not-an-email",
            "ada@example.com",
            "555",
            "(555) 123-4567",
            "Y",
        ]);
        let player = console.register_player().unwrap().unwrap();
        assert_eq!(player.name, "Ada");
        assert_eq!(player.email, "ada@example.com");
        assert_eq!(player.phone, "(555) 123-4567");
        assert!(player.contact_permission);
    }

    #[test]
    fn email_needs_user_domain_and_tld() {
        assert!(valid_email("test@example.com"));
        assert!(valid_email("first.last+tag@mail.example.co"));
        assert!(!valid_email("test@example"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("test@example.c"));
        assert!(!valid_email("test@example.c0m"));
        assert!(!valid_email("te st@example.com"));
    }

    #[test]
    fn phone_counts_digits_only() {
        assert!(valid_phone("1234567890"));
        assert!(valid_phone("+1 (555) 123-4567"));
        assert!(!valid_phone("555-1234"));
    }

    #[test]
    fn quit_or_blank_name_cancels_registration() {
        let (_tx, console) = scripted_console(&["quit"]);
        assert_eq!(console.register_player().unwrap(), None);
        let (_tx, console) = scripted_console(&["  "]);
        assert_eq!(console.register_player().unwrap(), None);
    }

    #[test]
    fn closed_console_is_an_error() {
        let (tx, console) = scripted_console(&["Ada"]);
        drop(tx);
        assert!(matches!(console.register_player(), Err(EntryError::ConsoleClosed)));
    }

    #[test]
    fn closed_console_ends_the_event_cleanly() {
        let (tx, console) = scripted_console(&["Ada", "ada@example.com"]);
        drop(tx);
        assert_eq!(console.next_player(), None);

        let (_tx, console) = scripted_console(&["Bo", "bo@example.com", "5551234567", "n"]);
        let player = console.next_player().unwrap();
        assert_eq!(player.name, "Bo");
        assert!(!player.contact_permission);
    }

    #[test]
    fn poll_signal_skips_other_input() {
        let (tx, console) = scripted_console(&["hello", "g"]);
        assert_eq!(console.poll_signal(), Some(OperatorSignal::GameOver));
        assert_eq!(console.poll_signal(), None);
        drop(tx);
        assert_eq!(console.poll_signal(), None);
    }

    #[test]
    fn score_entry_reprompts_until_valid() {
        let (tx, console) = scripted_console(&[]);
        let answers = thread::spawn(move || {
            // Sent after the prompt has drained stale input.
            thread::sleep(std::time::Duration::from_millis(50));
            for line in ["abc", "-1", "300"] {
                tx.send(line.to_string()).unwrap();
            }
            tx
        });
        assert_eq!(console.request_manual_score(2, "Ada").unwrap(), Some(300));
        drop(answers.join().unwrap());
        assert!(matches!(
            console.request_manual_score(3, "Ada"),
            Err(EntryError::ConsoleClosed)
        ));
    }

    #[test]
    fn blank_score_is_dismissal() {
        let (tx, console) = scripted_console(&[]);
        let sender = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            tx.send(String::new()).unwrap();
            tx
        });
        assert_eq!(console.request_manual_score(1, "Ada").unwrap(), None);
        drop(sender.join().unwrap());
    }
}
