use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Ls,
    Mkdir,
    Touch,
    Cd,
    Rm,
    Copy,
    Cat,
    Help,
    Exit,
}

impl Verb {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ls" => Some(Verb::Ls),
            "mkdir" => Some(Verb::Mkdir),
            "touch" => Some(Verb::Touch),
            "cd" => Some(Verb::Cd),
            "rm" => Some(Verb::Rm),
            "copy" => Some(Verb::Copy),
            "cat" => Some(Verb::Cat),
            "--help" => Some(Verb::Help),
            "exit" => Some(Verb::Exit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Ls => "ls",
            Verb::Mkdir => "mkdir",
            Verb::Touch => "touch",
            Verb::Cd => "cd",
            Verb::Rm => "rm",
            Verb::Copy => "copy",
            Verb::Cat => "cat",
            Verb::Help => "--help",
            Verb::Exit => "exit",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub args: Vec<String>,
}

impl Command {
    /// Parse one line of client input.
    ///
    /// Returns `None` for blank lines and unknown verbs. The verb is matched
    /// exactly against the first whitespace-separated token. Single-argument
    /// verbs take the rest of the line (trimmed, possibly empty) as their
    /// argument so names containing spaces survive; `copy` takes up to two
    /// tokens.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let token = line.split_whitespace().next()?;
        let verb = Verb::from_token(token)?;
        let rest = line[token.len()..].trim();

        let args = match verb {
            Verb::Ls | Verb::Help | Verb::Exit => {
                rest.split_whitespace().map(str::to_string).collect()
            }
            Verb::Mkdir | Verb::Touch | Verb::Cd | Verb::Rm | Verb::Cat => vec![rest.to_string()],
            Verb::Copy => rest.split_whitespace().take(2).map(str::to_string).collect(),
        };

        Some(Self { verb, args })
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}
