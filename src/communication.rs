use std::path::PathBuf;

use crate::alarm::AlarmId;

/// Transitions reported to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    AlarmRang(AlarmId),
    AlarmStopped(AlarmId),
}

/// Requests coming into a ringing session from its host.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// ring the alarm described by the settings file
    Fire(PathBuf),
    /// change a ringing alarm, the file holds the edit settings
    Edit(PathBuf),
    Stop(AlarmId),
    /// set the master volume, as if the user turned the knob
    Volume(f32),
    List,
    Quit,
}

impl Command {
    /// Parses one console line like `fire alarms/wake.toml` or `stop 3`.
    ///
    /// # Errors
    /// A description of what was wrong with the line.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(format!("unexpected `{extra}` after `{verb}`"));
        }
        match (verb, arg) {
            ("fire", Some(path)) => Ok(Self::Fire(PathBuf::from(path))),
            ("edit", Some(path)) => Ok(Self::Edit(PathBuf::from(path))),
            ("stop", Some(id)) => id
                .parse()
                .map(|id| Self::Stop(AlarmId(id)))
                .map_err(|e| format!("bad alarm id `{id}`: {e}")),
            ("volume", Some(level)) => match level.parse::<f32>() {
                Ok(level) if (0.0..=1.0).contains(&level) => Ok(Self::Volume(level)),
                Ok(level) => Err(format!("volume {level} is outside 0..=1")),
                Err(e) => Err(format!("bad volume `{level}`: {e}")),
            },
            ("list", None) => Ok(Self::List),
            ("quit" | "exit", None) => Ok(Self::Quit),
            ("fire" | "edit" | "stop" | "volume", None) => Err(format!("`{verb}` needs an argument")),
            _ => Err(format!("unknown command `{}`", line.trim())),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("fire wake.toml", Command::Fire(PathBuf::from("wake.toml")); "fire")]
    #[test_case("edit  quiet.toml", Command::Edit(PathBuf::from("quiet.toml")); "edit")]
    #[test_case("stop 42", Command::Stop(AlarmId(42)); "stop")]
    #[test_case("volume 0.25", Command::Volume(0.25); "volume")]
    #[test_case("list", Command::List; "list")]
    #[test_case("exit", Command::Quit; "exit")]
    fn parses_commands(line: &str, expected: Command) {
        assert_eq!(Command::parse(line), Ok(expected));
    }

    #[test_case(""; "empty")]
    #[test_case("stop"; "missing id")]
    #[test_case("stop soon"; "bad id")]
    #[test_case("volume 3"; "volume too loud")]
    #[test_case("snooze 3"; "unknown verb")]
    #[test_case("stop 3 4"; "two ids")]
    #[test_case("fire wake.toml nap.toml"; "two files")]
    #[test_case("list now"; "list with argument")]
    fn rejects_bad_lines(line: &str) {
        assert!(Command::parse(line).is_err());
    }

    #[test]
    fn names_the_leftover_word() {
        assert_eq!(
            Command::parse("stop 3 4"),
            Err("unexpected `4` after `stop`".to_string())
        );
    }
}
