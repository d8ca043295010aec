//! # Modem adapter
//!
//! The [Adapter] owns the byte transport and brokers all communication with the modem: it sends commands,
//! scans responses (s. [matcher](crate::matcher)), dispatches asynchronous notifications (s. [urc](crate::urc))
//! and keeps the table of virtual sockets (s. [stack](crate::stack)).
//!
//! All operations are blocking. The only suspension point is the yield hook of [Config], which is called on
//! every scan iteration.
//!
//! ## Example
//!
//! ````
//! # use modem_at_mux::example::{ExampleTimer, ExampleTransport};
//! use modem_at_mux::adapter::Adapter;
//! use modem_at_mux::matcher::Outcome;
//! use modem_at_mux::variant::ESP8266;
//!
//! let mut adapter: Adapter<_, _, 1_000, 5, 128> =
//!     Adapter::new(ExampleTransport::default(), ExampleTimer::default(), &ESP8266);
//! adapter.init().unwrap();
//!
//! adapter.send_command(&[b"+GMR"]).unwrap();
//! let outcome = adapter.wait_response(1_000, &[b"OK\r\n", b"ERROR\r\n"]).unwrap();
//! assert_eq!(Outcome::Matched(1), outcome);
//! assert!(adapter.response().starts_with(b"\r\nAT version"));
//! ````
use crate::config::Config;
use crate::helpers::LossyStr;
use crate::matcher::Outcome;
use crate::stack::SocketSlot;
use crate::variant::{Framing, Variant};
use embedded_io::{Read, ReadReady, Write};
use fugit_timer::Timer;
use heapless::Vec;

/// Prefix of every command
pub(crate) const COMMAND_PREFIX: &[u8] = b"AT";

/// Max. length of a single command line
pub(crate) const COMMAND_SIZE: usize = 256;

/// Capacity of the accumulated response buffer. Older bytes are dropped on overflow, terminal and
/// notification patterns need to be shorter than half of it.
pub(crate) const RESPONSE_SIZE: usize = 256;

/// Interval of the bare AT commands sent by `test_at()`
const TEST_AT_INTERVAL_MS: u32 = 200;

/// Timeout of the whole link test done by `init()`
const INIT_TEST_TIMEOUT_MS: u32 = 10_000;

/// Duplex byte stream to the modem, typically an UART
pub trait Transport: Read + Write + ReadReady {}

impl<X: Read + Write + ReadReady> Transport for X {}

/// Errors of the command engine
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Reading from the transport failed
    Read,

    /// Writing to the transport failed
    Write,

    /// No terminal pattern was received in time
    Timeout,

    /// Modem responded with an error marker
    Rejected,

    /// Fields of a notification could not be parsed, so the position in the byte stream is unknown.
    /// All further operations fail until `resynchronize()` or `init()` gets called.
    Desynchronized,

    /// Operation is not possible in the current transparent/command mode
    WrongMode,

    /// Response could not be interpreted
    InvalidResponse,

    /// Command exceeds the max. command length
    CommandOverflow,
}

/// Central client for network communication
///
/// MUX: Size of the socket table. Only the first `min(MUX, variant.mux_count)` sockets are used.
///
/// RX_SIZE: Size of the receive buffer per socket in bytes. One byte is reserved, so up to `RX_SIZE - 1`
/// bytes are buffered. Should be matched to `Variant::rx_buffer_size`.
pub struct Adapter<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize> {
    /// Serial connection to the modem
    pub(crate) transport: T,

    /// Timer used for deadline calculation
    pub(crate) timer: C,

    /// Command dialect of the connected modem
    pub(crate) variant: &'static Variant,

    pub(crate) config: Config,

    /// Socket table, array index = mux id
    pub(crate) sockets: [SocketSlot<RX_SIZE>; MUX],

    /// Bytes received by the current or last wait call
    pub(crate) response: Vec<u8, RESPONSE_SIZE>,

    /// True if notification framing was lost. Gets reset by `resynchronize()`.
    pub(crate) desynchronized: bool,

    /// True while a transparent variant is in command mode
    pub(crate) command_mode: bool,
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize>
    Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// Creates a new adapter with default timing configuration
    pub fn new(transport: T, timer: C, variant: &'static Variant) -> Self {
        Self::with_config(transport, timer, variant, Config::default())
    }

    pub fn with_config(transport: T, timer: C, variant: &'static Variant, config: Config) -> Self {
        Self {
            transport,
            timer,
            variant,
            config,
            sockets: core::array::from_fn(|_| SocketSlot::new()),
            response: Vec::new(),
            desynchronized: false,
            command_mode: false,
        }
    }

    /// Brings the modem into a defined state: Discards pending input, tests the link and sends the init
    /// commands of the variant. All sockets are marked as disconnected.
    pub fn init(&mut self) -> Result<(), Error> {
        debug!("Initializing {}", self.variant.name);
        self.resynchronize()?;

        for slot in self.sockets.iter_mut() {
            slot.mark_disconnected();
            slot.rx.clear();
        }

        let variant = self.variant;
        match &variant.framing {
            Framing::Packet(_) => {
                self.test_at(INIT_TEST_TIMEOUT_MS)?;
                self.run_init_commands()
            }
            Framing::Transparent(dialect) => {
                self.enter_command_mode(dialect)?;
                let result = self.run_init_commands();
                let exit = self.exit_command_mode(dialect);
                result.and(exit)
            }
        }
    }

    /// Sends bare AT commands until the modem answers with OK or the timeout elapses
    pub fn test_at(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let deadline = self.deadline(timeout_ms);
        let variant = self.variant;

        loop {
            self.send_command(&[])?;

            if let Outcome::Matched(1) = self.wait_response(TEST_AT_INTERVAL_MS, &[variant.ok, variant.error])? {
                return Ok(());
            }

            if self.is_expired(deadline) {
                return Err(Error::Timeout);
            }

            self.delay_ms(TEST_AT_INTERVAL_MS / 2);
        }
    }

    /// Discards all pending input and clears the desynchronized state
    pub fn resynchronize(&mut self) -> Result<(), Error> {
        let mut discarded = 0;
        while self.try_read_byte()?.is_some() {
            discarded += 1;
        }

        if self.desynchronized || discarded > 0 {
            debug!("Resynchronized, discarded {} bytes", discarded);
        }

        self.response.clear();
        self.desynchronized = false;
        Ok(())
    }

    /// True if notification framing was lost, s. [Error::Desynchronized]
    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    /// Writes a command line consisting of the AT prefix, the given fragments and the line terminator
    pub fn send_command(&mut self, fragments: &[&[u8]]) -> Result<(), Error> {
        self.assert_synchronized()?;

        let mut command: Vec<u8, COMMAND_SIZE> = Vec::new();
        command.extend_from_slice(COMMAND_PREFIX).map_err(|_| Error::CommandOverflow)?;
        for fragment in fragments {
            command.extend_from_slice(fragment).map_err(|_| Error::CommandOverflow)?;
        }
        command
            .extend_from_slice(self.variant.line_terminator)
            .map_err(|_| Error::CommandOverflow)?;

        debug!("Sending command: {:?}", LossyStr(&command));
        self.transport.write_all(&command).map_err(|_| Error::Write)?;
        self.transport.flush().map_err(|_| Error::Write)
    }

    /// Writes raw bytes, e.g. socket payload after a send prompt
    pub fn write_payload(&mut self, parts: &[&[u8]]) -> Result<(), Error> {
        self.assert_synchronized()?;

        let length: usize = parts.iter().map(|part| part.len()).sum();
        if length < 50 {
            debug!("Sending payload: {:?}", LossyStr(parts.first().copied().unwrap_or_default()));
        } else {
            debug!("Sending payload ({} bytes)", length);
        }

        for part in parts {
            self.transport.write_all(part).map_err(|_| Error::Write)?;
        }
        self.transport.flush().map_err(|_| Error::Write)
    }

    /// Sends a command and waits for the ok or error response of the variant
    pub fn command(&mut self, fragments: &[&[u8]], timeout_ms: u32) -> Result<(), Error> {
        let variant = self.variant;

        self.send_command(fragments)?;
        match self.wait_response(timeout_ms, &[variant.ok, variant.error])? {
            Outcome::Matched(1) => Ok(()),
            Outcome::Matched(_) => Err(Error::Rejected),
            Outcome::Timeout => Err(Error::Timeout),
        }
    }

    /// Bytes accumulated by the last wait call, including the matched terminal pattern
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Variant the adapter was created for
    pub fn variant(&self) -> &'static Variant {
        self.variant
    }

    /// Number of usable sockets
    pub fn mux_count(&self) -> usize {
        self.variant.mux_count.min(MUX)
    }

    /// Releases transport and timer
    pub fn release(self) -> (T, C) {
        (self.transport, self.timer)
    }

    fn run_init_commands(&mut self) -> Result<(), Error> {
        let variant = self.variant;

        for command in variant.init_commands {
            self.command(&[command.as_bytes()], variant.command_timeout_ms)?;
        }

        Ok(())
    }

    pub(crate) fn assert_synchronized(&self) -> Result<(), Error> {
        if self.desynchronized {
            return Err(Error::Desynchronized);
        }

        Ok(())
    }
}
