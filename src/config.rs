/// Timing configuration of the [Adapter](crate::adapter::Adapter). Modem specific constants like the default
/// command timeout are part of the [Variant](crate::variant::Variant) instead.
#[derive(Debug, Copy, Clone)]
pub struct Config {
    pub(crate) maintain_timeout_ms: u32,
    pub(crate) payload_timeout_ms: u32,
    pub(crate) connect_timeout_ms: u32,
    pub(crate) send_timeout_ms: u32,
    pub(crate) yield_hook: Option<fn()>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maintain_timeout_ms: 10,
            payload_timeout_ms: 1_000,
            connect_timeout_ms: 75_000,
            send_timeout_ms: 10_000,
            yield_hook: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the passive wait used by `available()` and `read()` for draining pending notifications
    #[must_use]
    pub const fn maintain_timeout(mut self, ms: u32) -> Self {
        self.maintain_timeout_ms = ms;
        self
    }

    /// Max. silence between two bytes while notification fields or payload are expected
    #[must_use]
    pub const fn payload_timeout(mut self, ms: u32) -> Self {
        self.payload_timeout_ms = ms;
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    #[must_use]
    pub const fn send_timeout(mut self, ms: u32) -> Self {
        self.send_timeout_ms = ms;
        self
    }

    /// Hook which is called on every scan iteration of a blocking wait, e.g. for handing control to a
    /// cooperative scheduler. Not needed on preemptive targets.
    #[must_use]
    pub const fn yield_hook(mut self, hook: fn()) -> Self {
        self.yield_hook = Some(hook);
        self
    }
}
