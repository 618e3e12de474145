//! Shell command construction
//!
//! Everything landfall sends to the target host is assembled here from
//! typed parts. Plan values only ever enter a command as quoted arguments
//! or env assignments, so hostile input cannot break out into the shell.

use std::fmt;

const MASK: &str = "******";

/// Quote a value for a POSIX shell.
///
/// Values made of safe characters pass through unchanged to keep rendered
/// commands readable; everything else is single-quoted with embedded
/// quotes escaped.
pub fn sh_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(b, b'_' | b'-' | b'.' | b'/' | b':' | b'@' | b'%' | b'+' | b',' | b'=')
        });
    if safe {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

#[derive(Debug, Clone)]
struct Arg {
    value: String,
    secret: bool,
}

#[derive(Debug, Clone)]
struct EnvVar {
    name: String,
    value: String,
    secret: bool,
}

/// A single remote command
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: String,
    args: Vec<Arg>,
    env: Vec<EnvVar>,
    sudo: bool,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            sudo: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: arg.into(),
            secret: false,
        });
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Argument masked in the display rendering
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg {
            value: arg.into(),
            secret: true,
        });
        self
    }

    /// Env assignment prefixed to the command
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            name: name.into(),
            value: value.into(),
            secret: false,
        });
        self
    }

    /// Env assignment masked in the display rendering
    pub fn secret_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            name: name.into(),
            value: value.into(),
            secret: true,
        });
        self
    }

    /// Run the command under sudo
    pub fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    /// Full shell text, secrets included
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    /// Shell text with secret args and env values masked
    pub fn display(&self) -> String {
        self.render_with(true)
    }

    fn render_with(&self, mask: bool) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.sudo {
            parts.push("sudo".to_string());
        }
        for env in &self.env {
            let value = if mask && env.secret {
                MASK.to_string()
            } else {
                sh_quote(&env.value)
            };
            parts.push(format!("{}={}", env.name, value));
        }
        parts.push(sh_quote(&self.program));
        for arg in &self.args {
            if mask && arg.secret {
                parts.push(MASK.to_string());
            } else {
                parts.push(sh_quote(&arg.value));
            }
        }
        parts.join(" ")
    }
}

/// Where a pipeline's stdout goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Redirect {
    #[default]
    Inherit,
    Null,
    File(String),
}

/// A `|` chain of commands with an optional final redirect
#[derive(Debug, Clone)]
pub struct Pipeline {
    commands: Vec<ShellCommand>,
    redirect: Redirect,
}

impl Pipeline {
    pub fn new(first: ShellCommand) -> Self {
        Self {
            commands: vec![first],
            redirect: Redirect::Inherit,
        }
    }

    pub fn pipe(mut self, next: ShellCommand) -> Self {
        self.commands.push(next);
        self
    }

    /// Discard stdout
    pub fn to_null(mut self) -> Self {
        self.redirect = Redirect::Null;
        self
    }

    /// Redirect stdout to a file
    pub fn to_file(mut self, path: impl Into<String>) -> Self {
        self.redirect = Redirect::File(path.into());
        self
    }

    pub fn render(&self) -> String {
        self.render_with(false)
    }

    pub fn display(&self) -> String {
        self.render_with(true)
    }

    fn render_with(&self, mask: bool) -> String {
        let mut text = self
            .commands
            .iter()
            .map(|c| c.render_with(mask))
            .collect::<Vec<_>>()
            .join(" | ");
        match &self.redirect {
            Redirect::Inherit => {}
            Redirect::Null => text.push_str(" > /dev/null"),
            Redirect::File(path) => {
                text.push_str(" > ");
                text.push_str(&sh_quote(path));
            }
        }
        text
    }
}

impl From<ShellCommand> for Pipeline {
    fn from(command: ShellCommand) -> Self {
        Pipeline::new(command)
    }
}

/// An ordered batch executed in one remote shell session.
///
/// Rendered with a `set -e` prefix: the first failing line aborts the
/// batch and its exit code becomes the session's. Shell state such as
/// `cd` persists across lines within the session.
#[derive(Debug, Clone, Default)]
pub struct RemoteScript {
    lines: Vec<Pipeline>,
}

impl RemoteScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, line: impl Into<Pipeline>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Full script text, secrets included
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    /// Script text with secrets masked, for logs and errors
    pub fn display(&self) -> String {
        self.render_with(true)
    }

    /// One-line masked summary for logs and error messages
    pub fn summary(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.render_with(true))
            .collect::<Vec<_>>()
            .join(" && ")
    }

    fn render_with(&self, mask: bool) -> String {
        let mut out = String::from("set -e\n");
        for line in &self.lines {
            out.push_str(&line.render_with(mask));
            out.push('\n');
        }
        out
    }
}

impl From<ShellCommand> for RemoteScript {
    fn from(command: ShellCommand) -> Self {
        RemoteScript::new().then(command)
    }
}

impl From<Pipeline> for RemoteScript {
    fn from(pipeline: Pipeline) -> Self {
        RemoteScript::new().then(pipeline)
    }
}

impl fmt::Display for RemoteScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sh_quote() {
        assert_eq!(sh_quote("nginx"), "nginx");
        assert_eq!(sh_quote("/var/www/shop"), "/var/www/shop");
        assert_eq!(sh_quote(""), "''");
        assert_eq!(sh_quote("hello world"), "'hello world'");
        assert_eq!(sh_quote("it's"), "'it'\\''s'");
        assert_eq!(sh_quote("$(reboot)"), "'$(reboot)'");
        assert_eq!(sh_quote("a;b"), "'a;b'");
    }

    #[test]
    fn test_command_render() {
        let cmd = ShellCommand::new("apt-get")
            .args(["install", "-y", "nginx"])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .sudo();
        assert_eq!(
            cmd.render(),
            "sudo DEBIAN_FRONTEND=noninteractive apt-get install -y nginx"
        );
    }

    #[test]
    fn test_injection_is_quoted() {
        let cmd = ShellCommand::new("git")
            .arg("clone")
            .arg("https://x/y.git; rm -rf /");
        assert_eq!(cmd.render(), "git clone 'https://x/y.git; rm -rf /'");
    }

    #[test]
    fn test_secret_masking() {
        let cmd = ShellCommand::new("mysql")
            .secret_env("MYSQL_PWD", "p@ss word")
            .args(["-u", "root", "-e"])
            .secret_arg("CREATE USER x IDENTIFIED BY 'p@ss word'");
        assert_eq!(cmd.display(), "MYSQL_PWD=****** mysql -u root -e ******");
        assert!(cmd.render().contains("p@ss word"));
        assert!(!cmd.display().contains("p@ss"));
    }

    #[test]
    fn test_pipeline_render() {
        let line = Pipeline::new(ShellCommand::new("printf").args(["%s", "aGk="]))
            .pipe(ShellCommand::new("base64").arg("-d"))
            .pipe(ShellCommand::new("tee").arg("/etc/nginx/sites-available/shop").sudo())
            .to_null();
        assert_eq!(
            line.render(),
            "printf %s aGk= | base64 -d | sudo tee /etc/nginx/sites-available/shop > /dev/null"
        );
    }

    #[test]
    fn test_script_render() {
        let script = RemoteScript::new()
            .then(ShellCommand::new("cd").arg("/var/www/shop"))
            .then(ShellCommand::new("php").args(["artisan", "migrate", "--force"]));
        assert_eq!(
            script.render(),
            "set -e\ncd /var/www/shop\nphp artisan migrate --force\n"
        );
    }
}
