//! Argument redaction for logged commands.
//!
//! Programmer and Ninja invocations may carry credentials as `key=value`
//! arguments; the value is masked before the command line reaches the log.

/// One command-line argument as logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArg(String);

impl CommandArg {
    /// Wrap `arg`.
    #[must_use]
    pub const fn new(arg: String) -> Self {
        Self(arg)
    }

    /// Borrow the argument text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_sensitive_key(key: &str) -> bool {
    const SENSITIVE_KEYS: [&str; 5] = ["password", "token", "secret", "api_key", "auth"];
    SENSITIVE_KEYS
        .iter()
        .any(|candidate| key.eq_ignore_ascii_case(candidate))
}

/// Whether `arg` is a `key=value` pair with a sensitive key.
#[must_use]
pub fn is_sensitive_arg(arg: &CommandArg) -> bool {
    arg.as_str()
        .split_once('=')
        .is_some_and(|(key, _)| is_sensitive_key(key.trim()))
}

/// Mask the value of a sensitive argument, keeping its key.
#[must_use]
pub fn redact_argument(arg: &CommandArg) -> CommandArg {
    match arg.as_str().split_once('=') {
        Some((key, _)) if is_sensitive_arg(arg) => {
            CommandArg::new(format!("{}=***REDACTED***", key.trim()))
        }
        _ => arg.clone(),
    }
}

/// Redact every argument in `args`.
#[must_use]
pub fn redact_sensitive_args(args: &[CommandArg]) -> Vec<CommandArg> {
    args.iter().map(redact_argument).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn arg(text: &str) -> CommandArg {
        CommandArg::new(text.to_owned())
    }

    #[rstest]
    #[case("token=abc", "token=***REDACTED***")]
    #[case("  PASSWORD = value ", "PASSWORD=***REDACTED***")]
    #[case("auth = token123", "auth=***REDACTED***")]
    #[case("path=/var/secrets", "path=/var/secrets")]
    #[case("secret", "secret")]
    #[case("-j", "-j")]
    fn only_sensitive_values_are_masked(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(redact_argument(&arg(raw)).as_str(), expected);
    }

    #[rstest]
    fn redaction_keeps_argument_order() {
        let redacted = redact_sensitive_args(&[arg("-f"), arg("secret=x"), arg("build")]);
        let texts: Vec<&str> = redacted.iter().map(CommandArg::as_str).collect();
        assert_eq!(texts, ["-f", "secret=***REDACTED***", "build"]);
    }
}
