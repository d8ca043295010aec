//! # Virtual sockets
//!
//! Each mux id of the modem is represented by a slot of the socket table owned by the [Adapter]. Slots are
//! handed out as [Socket] by [open_socket](Adapter::open_socket) or [TcpClientStack::socket].
//!
//! Sockets may be either used by the methods of [Adapter], by the [TcpClientStack] implementation or by a
//! borrowing [Client] handle implementing [embedded_io::Read] and [embedded_io::Write].
//!
//! ## Example
//!
//! ````
//! # use core::str::FromStr;
//! # use core::net::SocketAddr;
//! # use embedded_nal::TcpClientStack;
//! # use modem_at_mux::example::{ExampleTimer, ExampleTransport};
//! use modem_at_mux::adapter::Adapter;
//! use modem_at_mux::variant::ESP8266;
//!
//! let mut adapter: Adapter<_, _, 1_000, 5, 128> =
//!     Adapter::new(ExampleTransport::default(), ExampleTimer::default(), &ESP8266);
//! adapter.init().unwrap();
//!
//! // Creating a TCP connection
//! let mut socket = adapter.socket().unwrap();
//! adapter.connect(&mut socket, SocketAddr::from_str("10.0.0.1:21").unwrap()).unwrap();
//!
//! // Sending some data
//! adapter.send(&mut socket, b"hallo!").unwrap();
//!
//! // Receiving some data
//! let mut rx_buffer = [0x0; 64];
//! let length = adapter.receive(&mut socket, &mut rx_buffer).unwrap();
//! assert_eq!(16, length);
//! assert_eq!(b"nice to see you!", &rx_buffer[..16]);
//!
//! // Closing socket
//! adapter.close(socket).unwrap();
//! ````
use crate::adapter::{Adapter, Error as AtError, Transport};
use crate::fifo::RxFifo;
use crate::variant::Framing;
use core::fmt::Write as _;
use core::net::SocketAddr;
use embedded_io::{ErrorKind, ErrorType, Read, Write};
use embedded_nal::{TcpClientStack, TcpError, TcpErrorKind};
use fugit_timer::Timer;
use heapless::String;

/// Handle of a virtual socket
#[derive(Debug, PartialEq, Eq)]
pub struct Socket {
    /// Mux id of the modem
    pub(crate) link_id: usize,
}

impl Socket {
    pub(crate) fn new(link_id: usize) -> Self {
        Self { link_id }
    }

    /// Mux id used for addressing the connection on the modem
    pub fn mux(&self) -> usize {
        self.link_id
    }
}

/// Connection state of a socket
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Not connected, may be (re)connected
    #[default]
    Idle,

    /// Connect sequence is running
    Connecting,

    /// Connection is fully open
    Open,

    /// Close sequence is running
    Closing,
}

/// Internal state of a single mux slot
pub(crate) struct SocketSlot<const RX_SIZE: usize> {
    pub(crate) state: ConnectionState,

    /// Slot was handed out by `open_socket()`
    pub(crate) owned: bool,

    /// Pushed payload not read yet
    pub(crate) rx: RxFifo<RX_SIZE>,
}

impl<const RX_SIZE: usize> SocketSlot<RX_SIZE> {
    pub(crate) const fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            owned: false,
            rx: RxFifo::new(),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Sets the slot to idle, buffered payload stays readable
    pub(crate) fn mark_disconnected(&mut self) {
        self.state = ConnectionState::Idle;
    }
}

/// Network related errors
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Connect sequence failed
    ConnectError(AtError),

    /// Host name could not be resolved to an IP address
    ResolveFailed,

    /// Transmission of data failed
    SendFailed(AtError),

    /// Handling pending notifications failed while receiving
    ReceiveFailed(AtError),

    /// Close sequence failed. Socket is marked as disconnected anyway.
    CloseError(AtError),

    /// No socket available, since the maximum number is in use.
    NoSocketAvailable,

    /// Unable to send data if socket is not connected
    SocketUnconnected,
}

impl Error {
    /// Engine error causing the failure, if any
    pub fn cause(&self) -> Option<&AtError> {
        match self {
            Error::ConnectError(error)
            | Error::SendFailed(error)
            | Error::ReceiveFailed(error)
            | Error::CloseError(error) => Some(error),
            Error::ResolveFailed | Error::NoSocketAvailable | Error::SocketUnconnected => None,
        }
    }
}

impl TcpError for Error {
    fn kind(&self) -> TcpErrorKind {
        match self {
            Error::SocketUnconnected => TcpErrorKind::PipeClosed,
            _ => TcpErrorKind::Other,
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::SocketUnconnected => ErrorKind::NotConnected,
            Error::ResolveFailed => ErrorKind::AddrNotAvailable,
            error if error.cause() == Some(&AtError::Timeout) => ErrorKind::TimedOut,
            _ => ErrorKind::Other,
        }
    }
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize>
    Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// Assigns the first unused mux id. Returns [Error::NoSocketAvailable] if all sockets are in use.
    pub fn open_socket(&mut self) -> Result<Socket, Error> {
        let mux_count = self.mux_count();

        match self.sockets[..mux_count].iter().position(|slot| !slot.owned) {
            Some(link_id) => {
                let slot = &mut self.sockets[link_id];
                slot.owned = true;
                slot.state = ConnectionState::Idle;
                slot.rx.clear();

                debug!("Opened socket {}", link_id);
                Ok(Socket::new(link_id))
            }
            None => Err(Error::NoSocketAvailable),
        }
    }

    /// Connects the socket to the given host, which may be an IP address or a host name.
    /// An already open connection is closed first.
    pub fn connect_host(&mut self, socket: &Socket, host: &str, port: u16) -> Result<(), Error> {
        let mux = socket.link_id;

        if self.sockets[mux].is_connected() {
            if let Err(error) = self.stop(socket) {
                warn!("Closing socket {} before reconnect failed: {:?}", mux, error);
            }
        }

        self.sockets[mux].rx.clear();
        self.sockets[mux].state = ConnectionState::Connecting;
        debug!("Connecting socket {} to {}:{}", mux, host, port);

        match self.open_connection(mux, host, port) {
            Ok(()) => {
                self.sockets[mux].state = ConnectionState::Open;
                debug!("Socket {} connected", mux);
                Ok(())
            }
            Err(error) => {
                self.sockets[mux].state = ConnectionState::Idle;
                warn!("Connecting socket {} failed: {:?}", mux, error);
                Err(error)
            }
        }
    }

    /// Sends the given data and returns the number of bytes acknowledged by the modem.
    /// Data exceeding the max. chunk size of the variant is sent in multiple rounds.
    pub fn write(&mut self, socket: &Socket, data: &[u8]) -> Result<usize, Error> {
        if !self.sockets[socket.link_id].is_connected() {
            return Err(Error::SocketUnconnected);
        }

        self.send_data(socket.link_id, data)
    }

    /// Returns the number of buffered bytes. Pending notifications are handled first if the buffer is empty.
    pub fn available(&mut self, socket: &Socket) -> Result<usize, Error> {
        let mux = socket.link_id;

        if self.sockets[mux].rx.is_empty() {
            self.refill().map_err(Error::ReceiveFailed)?;
        }

        Ok(self.sockets[mux].rx.size())
    }

    /// Moves buffered bytes into the given buffer and returns the number of bytes copied.
    ///
    /// Blocks until the buffer is full, running maintenance waits while the socket buffer is empty. Returns early
    /// only once the connection is closed and all buffered data was consumed. The loop is not bounded by a timeout,
    /// s. [TcpClientStack::receive] for a non-blocking alternative.
    pub fn read(&mut self, socket: &Socket, buffer: &mut [u8]) -> Result<usize, Error> {
        let mux = socket.link_id;
        let mut length = 0;

        loop {
            length += self.sockets[mux].rx.get_slice(&mut buffer[length..]);
            if length == buffer.len() {
                return Ok(length);
            }

            if !self.sockets[mux].is_connected() && self.sockets[mux].rx.is_empty() {
                return Ok(length);
            }

            self.refill().map_err(Error::ReceiveFailed)?;
        }
    }

    /// Closes the connection. The socket is marked as disconnected regardless of the outcome.
    pub fn stop(&mut self, socket: &Socket) -> Result<(), Error> {
        let mux = socket.link_id;

        if !self.sockets[mux].is_connected() {
            self.sockets[mux].state = ConnectionState::Idle;
            return Ok(());
        }

        self.sockets[mux].state = ConnectionState::Closing;
        let result = self.close_connection(mux);
        self.sockets[mux].state = ConnectionState::Idle;

        debug!("Socket {} closed", mux);
        result.map_err(Error::CloseError)
    }

    /// True if buffered data is available or the connection is still open
    pub fn connected(&mut self, socket: &Socket) -> bool {
        match self.available(socket) {
            Ok(length) if length > 0 => true,
            Ok(_) => self.sockets[socket.link_id].is_connected(),
            Err(error) => {
                warn!("Checking socket {} failed: {:?}", socket.link_id, error);
                self.sockets[socket.link_id].is_connected()
            }
        }
    }

    /// Closes the connection and returns the mux id to the pool
    pub fn release_socket(&mut self, socket: Socket) -> Result<(), Error> {
        let result = self.stop(&socket);

        let slot = &mut self.sockets[socket.link_id];
        slot.owned = false;
        slot.rx.clear();

        result
    }

    /// Current connection state of the socket
    pub fn socket_state(&self, socket: &Socket) -> ConnectionState {
        self.sockets[socket.link_id].state
    }

    /// Returns a handle bound to the given socket
    pub fn client<'a>(&'a mut self, socket: &Socket) -> Client<'a, T, C, TIMER_HZ, MUX, RX_SIZE> {
        Client {
            adapter: self,
            socket: Socket::new(socket.link_id),
        }
    }

    /// Gives pending input the chance to reach the socket buffers
    fn refill(&mut self) -> Result<(), AtError> {
        match self.variant.framing {
            Framing::Packet(_) => self.maintain(),
            Framing::Transparent(_) => self.pump_transparent(),
        }
    }
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize> TcpClientStack
    for Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>
{
    type TcpSocket = Socket;
    type Error = Error;

    /// Assigns the first unused mux id, s. [Adapter::open_socket]
    fn socket(&mut self) -> Result<Self::TcpSocket, Self::Error> {
        self.open_socket()
    }

    /// Opens a new TCP connection. An already open connection of the socket is closed first.
    fn connect(&mut self, socket: &mut Socket, remote: SocketAddr) -> nb::Result<(), Self::Error> {
        let mut host: String<48> = String::new();
        write!(host, "{}", remote.ip()).map_err(|_| nb::Error::Other(Error::ConnectError(AtError::CommandOverflow)))?;

        self.connect_host(socket, &host, remote.port())?;
        nb::Result::Ok(())
    }

    /// Sends the given buffer and returns the length (in bytes) acknowledged by the modem
    fn send(&mut self, socket: &mut Socket, buffer: &[u8]) -> nb::Result<usize, Self::Error> {
        Ok(self.write(socket, buffer)?)
    }

    /// Receives buffered data. Returns [nb::Error::WouldBlock] if no data is available but the socket is still
    /// connected, otherwise [Error::SocketUnconnected].
    fn receive(&mut self, socket: &mut Self::TcpSocket, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        if self.available(socket)? > 0 {
            return nb::Result::Ok(self.sockets[socket.link_id].rx.get_slice(buffer));
        }

        if self.sockets[socket.link_id].is_connected() {
            return nb::Result::Err(nb::Error::WouldBlock);
        }

        nb::Result::Err(nb::Error::Other(Error::SocketUnconnected))
    }

    /// Closes the connection and releases the socket.
    /// In case of an error (which is returned) the socket is released anyway.
    fn close(&mut self, socket: Self::TcpSocket) -> Result<(), Self::Error> {
        self.release_socket(socket)
    }
}

/// Handle bound to a single socket
pub struct Client<'a, T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize> {
    adapter: &'a mut Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>,
    socket: Socket,
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize>
    Client<'_, T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// s. [Adapter::connect_host]
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), Error> {
        self.adapter.connect_host(&self.socket, host, port)
    }

    /// s. [Adapter::available]
    pub fn available(&mut self) -> Result<usize, Error> {
        self.adapter.available(&self.socket)
    }

    /// s. [Adapter::stop]
    pub fn stop(&mut self) -> Result<(), Error> {
        self.adapter.stop(&self.socket)
    }

    /// s. [Adapter::connected]
    pub fn connected(&mut self) -> bool {
        self.adapter.connected(&self.socket)
    }

    pub fn state(&self) -> ConnectionState {
        self.adapter.socket_state(&self.socket)
    }

    pub fn mux(&self) -> usize {
        self.socket.link_id
    }
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize> ErrorType
    for Client<'_, T, C, TIMER_HZ, MUX, RX_SIZE>
{
    type Error = Error;
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize> Read
    for Client<'_, T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// Blocks until at least one byte was received. Returns 0 once the connection is closed and all buffered
    /// data was consumed.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let mux = self.socket.link_id;

        loop {
            if self.adapter.available(&self.socket)? > 0 {
                return Ok(self.adapter.sockets[mux].rx.get_slice(buffer));
            }

            if !self.adapter.sockets[mux].is_connected() {
                return Ok(0);
            }
        }
    }
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize> Write
    for Client<'_, T, C, TIMER_HZ, MUX, RX_SIZE>
{
    fn write(&mut self, buffer: &[u8]) -> Result<usize, Self::Error> {
        self.adapter.write(&self.socket, buffer)
    }

    /// Data is handed over to the modem by `write()` already
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
