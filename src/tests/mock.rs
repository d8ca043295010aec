use crate::adapter::Adapter;
use crate::variant::Variant;
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer as FugitTimer;
use mockall::mock;
use std::collections::VecDeque;

/// Serial mock. Bytes of `add_rx()` are readable immediately, responses of `add_response()` get readable in the
/// same order as inserted, one per flush() call.
#[derive(Default)]
pub struct MockTransport {
    /// Bytes readable by the adapter
    pub rx: VecDeque<u8>,

    /// Mocked responses, released on flush
    responses: VecDeque<Vec<u8>>,

    /// Input arriving later, one chunk per poll of an empty receiver
    delayed: VecDeque<Vec<u8>>,

    /// Bytes written since the last flush
    pending: Vec<u8>,

    /// Written data, one entry per flush
    pub sent: Vec<Vec<u8>>,

    /// Simulates a broken receiver
    pub read_error: bool,

    /// Simulates a broken transmitter
    pub write_error: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds bytes which are readable immediately
    pub fn add_rx(&mut self, data: &[u8]) {
        self.rx.extend(data.iter());
    }

    /// Adds a mock response, getting readable on the next unanswered flush
    pub fn add_response(&mut self, response: &[u8]) {
        self.responses.push_back(response.to_vec());
    }

    /// Adds bytes which get readable after the receiver was found empty once
    pub fn add_delayed(&mut self, data: &[u8]) {
        self.delayed.push_back(data.to_vec());
    }

    /// Simulates a flush which is not answered
    pub fn add_silence(&mut self) {
        self.add_response(b"");
    }

    /// Returns the sent data as strings
    pub fn sent_as_strings(&self) -> Vec<String> {
        self.sent.iter().map(|data| String::from_utf8_lossy(data).to_string()).collect()
    }

    /// Bytes not read yet
    pub fn remaining(&self) -> Vec<u8> {
        self.rx.iter().copied().collect()
    }

    pub fn assert_all_responses_sent(&self) {
        assert!(self.responses.is_empty(), "Pending responses: {:?}", self.responses);
    }
}

impl ErrorType for MockTransport {
    type Error = ErrorKind;
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.read_error {
            return Err(ErrorKind::Other);
        }

        let mut length = 0;
        while length < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => buf[length] = byte,
                None => break,
            }
            length += 1;
        }

        Ok(length)
    }
}

impl ReadReady for MockTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.read_error {
            return Err(ErrorKind::Other);
        }

        if self.rx.is_empty() {
            if let Some(chunk) = self.delayed.pop_front() {
                self.rx.extend(chunk);
            }

            return Ok(false);
        }

        Ok(true)
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.write_error {
            return Err(ErrorKind::BrokenPipe);
        }

        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.write_error {
            return Err(ErrorKind::BrokenPipe);
        }

        self.sent.push(std::mem::take(&mut self.pending));
        if let Some(response) = self.responses.pop_front() {
            self.rx.extend(response);
        }

        Ok(())
    }
}

/// Clock advancing one millisecond on every query
#[derive(Default)]
pub struct MockClock {
    pub ticks: u32,
}

impl FugitTimer<1_000> for MockClock {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1_000> {
        self.ticks += 1;
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000>) -> Result<(), u32> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), u32> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), u32> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}

mock! {
    pub Timer{}

    impl FugitTimer<1_000> for Timer {
        type Error = u32;

        fn now(&mut self) -> TimerInstantU32<1000>;
        fn start(&mut self, duration: TimerDurationU32<1000>) -> Result<(), u32>;
        fn cancel(&mut self) -> Result<(), u32>;
        fn wait(&mut self) -> nb::Result<(), u32>;
    }
}

impl MockTimer {
    /// Short hand helper for returning an instant in milliseconds
    pub fn instant_ms(ms: u32) -> TimerInstantU32<1_000> {
        TimerInstantU32::from_ticks(ms)
    }
}

pub type MockAdapter = Adapter<MockTransport, MockClock, 1_000, 5, 32>;

/// Creates an adapter for the given variant, which is considered as initialized
pub fn adapter(variant: &'static Variant) -> MockAdapter {
    Adapter::new(MockTransport::new(), MockClock::default(), variant)
}

/// Creates an adapter with an opened socket for each mux id, all connected
pub fn connected_adapter(variant: &'static Variant) -> MockAdapter {
    let mut adapter = adapter(variant);

    for _ in 0..adapter.mux_count() {
        let socket = adapter.open_socket().unwrap();
        adapter.sockets[socket.link_id].state = crate::stack::ConnectionState::Open;
    }

    adapter
}
