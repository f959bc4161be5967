use thiserror::Error;

/// Comandos de texto reconocidos por el bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Join,
    Kill,
    Resume,
    Pause,
    Add(String),
    Next,
    RandomNext,
    Goto(usize),
    Status,
    Persist,
    Shuffle,
    Remove(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("comando desconocido: {0}")]
    Unknown(String),

    #[error("falta {0}")]
    MissingArgument(&'static str),

    #[error("índice inválido: {0}")]
    InvalidIndex(String),
}

impl Command {
    /// Interpreta un mensaje. `None` si no empieza con el prefijo.
    ///
    /// El nombre del comando no distingue mayúsculas; el argumento es el
    /// resto del mensaje tras el primer espacio.
    pub fn parse(content: &str, prefix: &str) -> Option<Result<Self, CommandError>> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        Some(Self::from_parts(&name.to_lowercase(), arg))
    }

    fn from_parts(name: &str, arg: &str) -> Result<Self, CommandError> {
        let command = match name {
            "help" => Self::Help,
            "join" => Self::Join,
            "die" | "kill" | "leave" => Self::Kill,
            "play" | "resume" => Self::Resume,
            "pause" | "stop" => Self::Pause,
            "add" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("qué agregar"));
                }
                Self::Add(arg.to_string())
            }
            "next" | "skip" => Self::Next,
            "randnext" | "rnext" => Self::RandomNext,
            "goto" | "item" | "skipto" => Self::Goto(parse_index(arg)?),
            "status" => Self::Status,
            "persist" => Self::Persist,
            "shuffle" => Self::Shuffle,
            "remove" => Self::Remove(parse_index(arg)?),
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn parse_index(arg: &str) -> Result<usize, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument("el índice"));
    }
    arg.parse()
        .map_err(|_| CommandError::InvalidIndex(arg.to_string()))
}
