//! Render context configuration

/// Configuration for a render or revalidation pass.
///
/// This is handed to both VMs and controls nesting limits and tracing.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Maximum number of nested frames (component layouts and yielded blocks)
    pub max_depth: usize,

    /// Whether to emit a `trace` event for every dispatched opcode
    pub trace: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            trace: false,
        }
    }
}

impl RenderContext {
    /// Create a new context with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a custom nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Default::default()
        }
    }

    /// Enable or disable per-opcode tracing.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
