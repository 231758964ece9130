/// Interpreter limits chosen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How many `run` calls may be active at once.
    pub max_call_depth: usize,
}

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

impl Default for Config {
    fn default() -> Self {
        Config {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}
