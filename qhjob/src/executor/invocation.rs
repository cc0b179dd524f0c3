use tokio::process::Command;

const SHELL: &str = "/bin/sh";

/// Characters that only a shell knows what to do with.
const SHELL_METACHARACTERS: &[char] = &[
    '!', '$', '^', '&', '*', '(', ')', '~', '[', ']', '\\', '|', '{', '}', ';', '<', '>', '?',
    '\'', '"', '`', '#', '\n',
];

/// How a check's command line gets launched.
///
/// Plain `program arg arg` lines are executed directly, so a missing program is
/// reported as a spawn failure. Anything needing quoting, expansion or
/// redirection goes through `/bin/sh -c`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    Direct { program: String, args: Vec<String> },
    Shell { script: String },
}

impl Invocation {
    /// `None` for a blank command line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        if line.contains(SHELL_METACHARACTERS) || program.contains('=') {
            return Some(Invocation::Shell {
                script: line.to_string(),
            });
        }
        Some(Invocation::Direct {
            program: program.to_string(),
            args: words.map(str::to_string).collect(),
        })
    }

    /// Name used in diagnostics.
    pub fn program(&self) -> &str {
        match self {
            Invocation::Direct { program, .. } => program,
            Invocation::Shell { .. } => SHELL,
        }
    }

    pub fn command(&self) -> Command {
        match self {
            Invocation::Direct { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                command
            }
            Invocation::Shell { script } => {
                let mut command = Command::new(SHELL);
                command.arg("-c").arg(script);
                command
            }
        }
    }
}
