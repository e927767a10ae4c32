use std::io::IsTerminal;

/// Knobs for the interactive loop.
///
/// Nothing is read from disk or the command line; embedders construct this directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Wrap the prompt in a green ANSI colour.
    pub color_prompt: bool,
    /// Marker printed after the working directory, e.g. `/home/me $ `.
    pub prompt_marker: String,
    /// Silently ignore commands whose arguments fail to parse instead of printing usage.
    pub lenient_args: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            color_prompt: std::io::stdout().is_terminal(),
            prompt_marker: "$".to_string(),
            lenient_args: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reports_usage_errors() {
        let config = ShellConfig::default();
        assert_eq!(config.prompt_marker, "$");
        assert!(!config.lenient_args);
    }
}
