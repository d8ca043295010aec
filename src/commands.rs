//! Connect, send and close sequences of the supported framings
use crate::adapter::{Adapter, Error as AtError, Transport};
use crate::helpers::{trim, LossyStr, NumBuffer};
use crate::matcher::Outcome;
use crate::stack::Error as StackError;
use crate::variant::{DnsQuery, Framing, PacketDialect, Reply, TransparentDialect};
use core::net::Ipv4Addr;
use fugit_timer::Timer;
use heapless::Vec;

/// Timeout for host name lookups
const RESOLVE_TIMEOUT_MS: u32 = 10_000;

/// Max. length of a resolved IP address line
const ADDRESS_SIZE: usize = 48;

/// IP address resolved from a host name
type Address = Vec<u8, ADDRESS_SIZE>;

/// Returns true if the host is an IPv4 literal which needs no lookup
fn is_ipv4_literal(host: &[u8]) -> bool {
    core::str::from_utf8(host)
        .ok()
        .and_then(|host| host.parse::<Ipv4Addr>().ok())
        .is_some()
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize>
    Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// Runs the connect sequence of the variant
    pub(crate) fn open_connection(&mut self, mux: usize, host: &str, port: u16) -> Result<(), StackError> {
        let variant = self.variant;

        match &variant.framing {
            Framing::Packet(dialect) => self.packet_connect(dialect, mux, host.as_bytes(), port),
            Framing::Transparent(dialect) => self.transparent_connect(dialect, host.as_bytes(), port),
        }
    }

    /// Runs the send sequence of the variant and returns the number of bytes acknowledged by the modem
    pub(crate) fn send_data(&mut self, mux: usize, data: &[u8]) -> Result<usize, StackError> {
        let variant = self.variant;

        match &variant.framing {
            Framing::Packet(dialect) => self.packet_send(dialect, mux, data),
            Framing::Transparent(_) => self.transparent_send(data),
        }
    }

    /// Runs the close sequence of the variant
    pub(crate) fn close_connection(&mut self, mux: usize) -> Result<(), AtError> {
        let variant = self.variant;

        match &variant.framing {
            Framing::Packet(dialect) => self.packet_close(dialect, mux),
            Framing::Transparent(dialect) => self.transparent_close(dialect),
        }
    }

    fn packet_connect(
        &mut self,
        dialect: &PacketDialect,
        mux: usize,
        host: &[u8],
        port: u16,
    ) -> Result<(), StackError> {
        let resolved: Address;
        let host = match &dialect.resolve {
            Some(query) if !is_ipv4_literal(host) => {
                resolved = self.resolve_packet(query, host)?;
                &resolved[..]
            }
            _ => host,
        };

        let quote: &[u8] = if dialect.quote_host { b"\"" } else { b"" };
        let protocol = dialect.protocol.unwrap_or_default().as_bytes();

        let mut mux_buffer = NumBuffer::new();
        let mut port_buffer = NumBuffer::new();
        let (mux_field, mux_delimiter) = self.mux_prefix(&mut mux_buffer, mux);

        self.send_command(&[
            dialect.connect_command.as_bytes(),
            mux_field,
            mux_delimiter,
            protocol,
            quote,
            host,
            quote,
            b",",
            port_buffer.decimal(port as usize),
        ])
        .map_err(StackError::ConnectError)?;

        self.exchange(&dialect.connect_reply, mux, self.config.connect_timeout_ms)
            .map_err(StackError::ConnectError)
    }

    /// Looks up the IP address of the given host name
    fn resolve_packet(&mut self, query: &DnsQuery, host: &[u8]) -> Result<Address, StackError> {
        let variant = self.variant;
        debug!("Resolving {:?}", LossyStr(host));

        self.send_command(&[query.command.as_bytes(), b"\"", host, b"\""])
            .map_err(StackError::ConnectError)?;

        match self
            .wait_response(RESOLVE_TIMEOUT_MS, &[query.answer, variant.error])
            .map_err(StackError::ConnectError)?
        {
            Outcome::Matched(1) => {}
            Outcome::Matched(_) => return Err(StackError::ResolveFailed),
            Outcome::Timeout => return Err(StackError::ConnectError(AtError::Timeout)),
        }

        let line: Address = self.read_line(b'\n').map_err(StackError::ConnectError)?;
        let address = Address::from_slice(trim(&line)).map_err(|_| StackError::ResolveFailed)?;
        if !is_ipv4_literal(&address) {
            warn!("Lookup of {:?} failed: {:?}", LossyStr(host), LossyStr(&line));
            return Err(StackError::ResolveFailed);
        }

        // Final confirmation is optional
        self.wait_response(variant.command_timeout_ms, &[query.done])
            .map_err(StackError::ConnectError)?;

        debug!("Resolved {:?} to {:?}", LossyStr(host), LossyStr(&address));
        Ok(address)
    }

    fn packet_send(&mut self, dialect: &PacketDialect, mux: usize, data: &[u8]) -> Result<usize, StackError> {
        let mut sent = 0;

        for chunk in data.chunks(dialect.max_chunk.max(1)) {
            if let Err(error) = self.packet_send_chunk(dialect, mux, chunk) {
                if sent == 0 {
                    return Err(StackError::SendFailed(error));
                }

                warn!("Send on socket {} aborted after {} of {} bytes", mux, sent, data.len());
                return Ok(sent);
            }

            sent += chunk.len();
        }

        Ok(sent)
    }

    fn packet_send_chunk(&mut self, dialect: &PacketDialect, mux: usize, chunk: &[u8]) -> Result<(), AtError> {
        let mut mux_buffer = NumBuffer::new();
        let mut length_buffer = NumBuffer::new();
        let (mux_field, mux_delimiter) = self.mux_prefix(&mut mux_buffer, mux);

        self.send_command(&[
            dialect.send_command.as_bytes(),
            mux_field,
            mux_delimiter,
            length_buffer.decimal(chunk.len()),
        ])?;
        self.exchange(&dialect.prompt, mux, self.variant.command_timeout_ms)?;

        self.write_payload(&[chunk, dialect.payload_suffix])?;
        self.exchange(&dialect.send_reply, mux, self.config.send_timeout_ms)
    }

    fn packet_close(&mut self, dialect: &PacketDialect, mux: usize) -> Result<(), AtError> {
        let mut mux_buffer = NumBuffer::new();
        let (mux_field, _) = self.mux_prefix(&mut mux_buffer, mux);

        self.send_command(&[
            dialect.close_command.as_bytes(),
            mux_field,
            dialect.close_suffix.as_bytes(),
        ])?;
        self.exchange(&dialect.close_reply, mux, self.variant.command_timeout_ms)
    }

    /// Mux field and its delimiter, both empty for single socket variants
    fn mux_prefix<'a>(&self, buffer: &'a mut NumBuffer, mux: usize) -> (&'a [u8], &'static [u8]) {
        if self.variant.mux_count <= 1 {
            return (&[], &[]);
        }

        (buffer.decimal(mux), b",")
    }

    /// Waits for one of the reply patterns of the given socket and maps the outcome
    fn exchange(&mut self, reply: &Reply, mux: usize, timeout_ms: u32) -> Result<(), AtError> {
        let deadline = self.deadline(timeout_ms);

        loop {
            let timeout = self.remaining_ms(deadline);
            let index = match self.wait_response(timeout, reply.patterns)? {
                Outcome::Matched(index) if reply.is_success(index) => index,
                Outcome::Matched(_) => return Err(AtError::Rejected),
                Outcome::Timeout => return Err(AtError::Timeout),
            };

            let echoed = match reply.mux_echo {
                Some(delimiter) => match self.read_field(delimiter).map_err(|error| self.on_field_error(error, None))? {
                    Some(echoed) => Some(echoed),
                    None => return Err(self.desynchronize(None)),
                },
                None => None,
            };

            if reply.skip_line {
                self.skip_until(b'\n')?;
            }

            // Same pattern naming another socket is a close notification of that one
            if let Some(other) = echoed.filter(|echoed| *echoed != mux) {
                self.close_by_remote(other);
                continue;
            }

            if let Some((trailing_index, trailer)) = reply.trailer {
                if trailing_index == index {
                    let timeout = self.remaining_ms(deadline);
                    self.wait_response(timeout, &[trailer])?;
                }
            }

            return Ok(());
        }
    }

    /// Switches a transparent variant into command mode: guard time silence, escape sequence, guard time silence
    pub(crate) fn enter_command_mode(&mut self, dialect: &TransparentDialect) -> Result<(), AtError> {
        if self.command_mode {
            return Ok(());
        }

        // Payload received so far must not end up in the response buffer. Bytes arriving during the guard time
        // after the escape still do.
        self.pump_transparent()?;
        self.delay_ms(dialect.guard_time_ms);
        self.pump_transparent()?;

        self.write_payload(&[dialect.escape])?;

        let variant = self.variant;
        let timeout = dialect.guard_time_ms * 2 + variant.command_timeout_ms;
        match self.wait_response(timeout, &[variant.ok, variant.error])? {
            Outcome::Matched(1) => {
                debug!("Entered command mode");
                self.command_mode = true;
                Ok(())
            }
            Outcome::Matched(_) => Err(AtError::Rejected),
            Outcome::Timeout => Err(AtError::Timeout),
        }
    }

    /// Leaves command mode. The adapter considers itself in transparent mode afterwards in any case.
    pub(crate) fn exit_command_mode(&mut self, dialect: &TransparentDialect) -> Result<(), AtError> {
        let result = self.command(&[dialect.exit_command.as_bytes()], self.variant.command_timeout_ms);
        self.command_mode = false;
        debug!("Left command mode");
        result
    }

    fn transparent_connect(&mut self, dialect: &TransparentDialect, host: &[u8], port: u16) -> Result<(), StackError> {
        self.enter_command_mode(dialect).map_err(StackError::ConnectError)?;

        let result = self.configure_destination(dialect, host, port);
        let exit = self.exit_command_mode(dialect);

        result?;
        exit.map_err(StackError::ConnectError)
    }

    fn configure_destination(&mut self, dialect: &TransparentDialect, host: &[u8], port: u16) -> Result<(), StackError> {
        let address = if is_ipv4_literal(host) {
            Address::from_slice(host).map_err(|_| StackError::ResolveFailed)?
        } else {
            self.resolve_transparent(dialect, host)?
        };

        let timeout = self.variant.command_timeout_ms;
        let mut port_buffer = NumBuffer::new();

        self.command(&[dialect.address_command.as_bytes(), &address[..]], timeout)
            .map_err(StackError::ConnectError)?;
        self.command(&[dialect.port_command.as_bytes(), port_buffer.hex(port as usize)], timeout)
            .map_err(StackError::ConnectError)
    }

    /// Looks up a host name in command mode, answered by the bare address line
    fn resolve_transparent(&mut self, dialect: &TransparentDialect, host: &[u8]) -> Result<Address, StackError> {
        let variant = self.variant;
        debug!("Resolving {:?}", LossyStr(host));

        self.send_command(&[dialect.resolve_command.as_bytes(), host])
            .map_err(StackError::ConnectError)?;

        match self
            .wait_response(RESOLVE_TIMEOUT_MS, &[variant.line_terminator])
            .map_err(StackError::ConnectError)?
        {
            Outcome::Matched(_) => {}
            Outcome::Timeout => return Err(StackError::ConnectError(AtError::Timeout)),
        }

        let address = Address::from_slice(trim(self.response())).map_err(|_| StackError::ResolveFailed)?;
        if !is_ipv4_literal(&address) {
            warn!("Lookup of {:?} failed: {:?}", LossyStr(host), LossyStr(&address));
            return Err(StackError::ResolveFailed);
        }

        Ok(address)
    }

    fn transparent_send(&mut self, data: &[u8]) -> Result<usize, StackError> {
        if self.command_mode {
            return Err(StackError::SendFailed(AtError::WrongMode));
        }

        self.write_payload(&[data]).map_err(StackError::SendFailed)?;
        Ok(data.len())
    }

    fn transparent_close(&mut self, dialect: &TransparentDialect) -> Result<(), AtError> {
        self.enter_command_mode(dialect)?;

        let result = self.command(&[dialect.close_command.as_bytes()], self.variant.command_timeout_ms);
        let exit = self.exit_command_mode(dialect);

        result.and(exit)
    }

    /// Moves pending transparent payload into the buffer of the single socket. Bytes exceeding the free buffer space
    /// are read and dropped.
    pub(crate) fn pump_transparent(&mut self) -> Result<(), AtError> {
        if self.command_mode || self.mux_count() == 0 {
            return Ok(());
        }

        self.assert_synchronized()?;

        let mut dropped = 0;
        while let Some(byte) = self.try_read_byte()? {
            if !self.sockets[0].rx.put(byte) {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!("RX buffer of socket 0 overflows, dropping {} bytes", dropped);
        }

        Ok(())
    }
}
