//! Builder for runner subprocess invocations.

use std::path::PathBuf;
use std::process::Stdio;

/// A program invocation with arguments and a working directory.
///
/// # Example
///
/// ```
/// use tagshard::executor::Command;
///
/// let cmd = Command::new("go").arg("test").args(["./a", "./b"]);
/// assert_eq!(cmd.to_shell_string(), "go test ./a ./b");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The program/executable to run.
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Working directory. `None` inherits the current directory.
    pub working_dir: Option<PathBuf>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Renders the command for log and error messages. Arguments containing
    /// whitespace or quotes are single-quoted.
    pub fn to_shell_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| shell_quote(part))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Builds the tokio command with stdin closed. The child is killed if the
    /// handle is dropped before it exits.
    pub(crate) fn to_tokio(&self) -> tokio::process::Command {
        let mut process = tokio::process::Command::new(&self.program);
        process.args(&self.args);
        if let Some(dir) = &self.working_dir {
            process.current_dir(dir);
        }
        process.stdin(Stdio::null());
        process.kill_on_drop(true);
        process
    }
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\' | '$' | '`'))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let cmd = Command::new("go")
            .arg("test")
            .args(vec!["-count=1".to_string()])
            .working_dir("/src");
        assert_eq!(cmd.program, "go");
        assert_eq!(cmd.args, ["test", "-count=1"]);
        assert_eq!(cmd.working_dir, Some(PathBuf::from("/src")));
    }

    #[test]
    fn test_to_shell_string_quotes() {
        let cmd = Command::new("sh").args(["-c", "echo 'hi there'", ""]);
        assert_eq!(
            cmd.to_shell_string(),
            r#"sh -c 'echo '\''hi there'\''' ''"#
        );
    }
}
