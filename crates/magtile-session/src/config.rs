use magtile_line::LineConfig;

/// Configuration for a [`Session`](crate::Session) or its async counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Line framing limits.
    pub line: LineConfig,
    /// Read and discard one line right after opening. The firmware prints a
    /// ready banner on reset, and opening the port resets most boards.
    pub drain_banner: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line: LineConfig::default(),
            drain_banner: true,
        }
    }
}
