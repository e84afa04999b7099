use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

/// A parsed console command. Anything else typed on stdin is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    Advertise,
    SendMessage(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();

        if line == "Register" {
            return Some(Self::Register);
        }

        if line == "Advertise" {
            return Some(Self::Advertise);
        }

        if let Some(text) = line.strip_prefix("SendMessage ") {
            let text = text.trim();
            if !text.is_empty() {
                return Some(Self::SendMessage(text.to_string()));
            }
        }

        None
    }
}

/// Buffered console input.
///
/// A background task pushes raw stdin lines into a shared buffer; the
/// peer main loop drains and parses them once per cycle.
#[derive(Default, Clone)]
pub struct UserInterface {
    buffer: Arc<Mutex<Vec<String>>>,
}

impl UserInterface {
    pub fn spawn() -> Self {
        let ui = Self::default();

        let buffer = ui.buffer.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                buffer.lock().push(line);
            }

            log::info!("console input closed");
        });

        ui
    }

    pub fn push(&self, line: String) {
        self.buffer.lock().push(line);
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.buffer.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_command_set() {
        assert_eq!(Command::parse("Register"), Some(Command::Register));
        assert_eq!(Command::parse("Advertise"), Some(Command::Advertise));
        assert_eq!(
            Command::parse("SendMessage salam network"),
            Some(Command::SendMessage("salam network".to_string()))
        );
    }

    #[test]
    fn ignores_everything_else() {
        for line in ["", "register", "SendMessage", "SendMessage   ", "Quit"] {
            assert_eq!(Command::parse(line), None, "accepted {line:?}");
        }
    }

    #[test]
    fn buffer_drains_in_order() {
        let ui = UserInterface::default();
        ui.push("Register".to_string());
        ui.push("Advertise".to_string());

        assert_eq!(ui.drain(), vec!["Register", "Advertise"]);
        assert!(ui.drain().is_empty());
    }
}
