//! Minimal CLI parsing for one-shot runs.

use std::env;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Run the task immediately and exit instead of scheduling it
    pub once: bool,
    /// Run the task once at startup, then keep to the schedule
    pub run_on_start: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        for arg in args {
            match arg.as_str() {
                "--once" => options.once = true,
                "--run-on-start" => options.run_on_start = true,
                _ => {}
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let options = CliOptions::parse(["--once".to_string(), "--verbose".to_string()]);
        assert!(options.once);
        assert!(!options.run_on_start);

        assert_eq!(CliOptions::parse(Vec::new()), CliOptions::default());
    }
}
