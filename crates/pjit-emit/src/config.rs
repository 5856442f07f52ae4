//! Emit configuration.

/// Default bound on chained tail calls.
pub const MAX_TAIL_CALL_CNT: u16 = 33;

/// Byte offsets the tail-call sequence reads from runtime objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TailCallLayout {
    /// Capacity word in the program array.
    pub max_entries: i16,
    /// Start of the program array's 4-byte pointer table.
    pub ptrs: i16,
    /// Entry pointer in a compiled-program object.
    pub prog_func: i16,
}

impl TailCallLayout {
    pub const fn new() -> Self {
        Self {
            max_entries: 24,
            ptrs: 256,
            prog_func: 16,
        }
    }
}

impl Default for TailCallLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// Code generation configuration, shared by every compilation for one
/// target ABI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmitConfig {
    /// Chained tail calls allowed before the sequence falls through.
    pub max_tail_calls: u16,
    /// Entry pointers name a two-word function descriptor rather than code.
    pub function_descriptors: bool,
    pub tail_call_layout: TailCallLayout,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitConfig {
    pub const fn new() -> Self {
        Self {
            max_tail_calls: MAX_TAIL_CALL_CNT,
            function_descriptors: false,
            tail_call_layout: TailCallLayout::new(),
        }
    }

    #[must_use]
    pub const fn with_max_tail_calls(mut self, max: u16) -> Self {
        self.max_tail_calls = max;
        self
    }

    #[must_use]
    pub const fn with_function_descriptors(mut self, enabled: bool) -> Self {
        self.function_descriptors = enabled;
        self
    }

    #[must_use]
    pub const fn with_tail_call_layout(mut self, layout: TailCallLayout) -> Self {
        self.tail_call_layout = layout;
        self
    }
}
