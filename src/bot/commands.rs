/// A parsed prefix command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `play <query>`; the query may be empty and is validated by the dispatcher.
    Play(String),
    /// Bare `queue`, or an unknown subcommand.
    QueueHelp,
    QueueList,
    QueueAdd(String),
    QueueClear,
    Skip,
    Pause,
    Resume,
    Stop,
    /// `volume <percent>`; `None` when the argument is missing or not an integer.
    Volume(Option<i64>),
}

impl Command {
    /// Parses `content` if it starts with `prefix` and names a known command.
    pub fn parse(prefix: &str, content: &str) -> Option<Self> {
        let body = content.strip_prefix(prefix)?;
        let (name, rest) = split_word(body.trim_start());
        let rest = rest.trim();

        let command = match name.to_lowercase().as_str() {
            "play" => Command::Play(rest.to_string()),
            "queue" => {
                let (sub, arg) = split_word(rest);
                match sub.to_lowercase().as_str() {
                    "list" => Command::QueueList,
                    "add" => Command::QueueAdd(arg.trim().to_string()),
                    "clear" => Command::QueueClear,
                    _ => Command::QueueHelp,
                }
            }
            "skip" => Command::Skip,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "stop" => Command::Stop,
            "volume" => Command::Volume(rest.parse().ok()),
            _ => return None,
        };

        Some(command)
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(index) => text.split_at(index),
        None => (text, ""),
    }
}
