//! # Unsolicited result codes
//!
//! Notifications are described per variant by a table of [UrcPattern]. Once a prefix matches the tail of the
//! response buffer, the handler reads the structured fields following the prefix directly from the transport.
//!
//! Pushed payload is routed into the receive buffer of the addressed socket. Payload for unknown or unowned sockets
//! as well as payload exceeding the free buffer space is consumed and dropped, so framing is kept in any case.
use crate::adapter::{Adapter, Error, Transport};
use crate::helpers::{trailing_decimal, LossyStr};
use fugit_timer::Timer;

/// Notification prefix and the handler to run on a match
#[derive(Copy, Clone, Debug)]
pub struct UrcPattern {
    /// Bytes identifying the notification
    pub prefix: &'static [u8],

    pub action: UrcAction,
}

/// Handler of a notification
#[derive(Copy, Clone, Debug)]
pub enum UrcAction {
    /// Socket data gets pushed: `[mux<delimiter>]length<length_end><payload>`
    DataPush {
        mux: MuxField,

        /// Byte terminating the length field
        length_end: u8,
    },

    /// Link of a socket was closed
    LinkClosed {
        mux: MuxField,

        /// Drop the remaining line after the mux field
        skip_line: bool,
    },
}

/// Location of the mux id of a notification
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MuxField {
    /// Single socket variant, always mux 0
    Implicit,

    /// Decimal digits right in front of the prefix, e.g. `2,CLOSED`
    Before,

    /// Decimal field following the prefix, terminated by the given delimiter
    After(u8),
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize>
    Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// Runs the handler of a matched notification
    pub(crate) fn handle_urc(&mut self, pattern: &UrcPattern) -> Result<(), Error> {
        trace!("Matched URC {:?}", LossyStr(pattern.prefix));

        match pattern.action {
            UrcAction::DataPush { mux, length_end } => self.handle_data_push(pattern.prefix, mux, length_end),
            UrcAction::LinkClosed { mux, skip_line } => self.handle_link_closed(pattern.prefix, mux, skip_line),
        }
    }

    fn handle_data_push(&mut self, prefix: &[u8], mux: MuxField, length_end: u8) -> Result<(), Error> {
        let mux = match mux {
            MuxField::Implicit => 0,
            MuxField::After(delimiter) => match self.read_urc_field(delimiter, None)? {
                Some(mux) => mux,
                None => return Err(self.desynchronize(None)),
            },
            MuxField::Before => match trailing_decimal(self.response_head(prefix)) {
                Some(mux) => mux,
                None => return Err(self.desynchronize(None)),
            },
        };

        let length = match self.read_urc_field(length_end, Some(mux))? {
            Some(length) => length,
            None => return Err(self.desynchronize(Some(mux))),
        };

        self.drain_payload(mux, length)
    }

    /// Consumes exactly `length` payload bytes, storing as many as fit into the socket buffer
    fn drain_payload(&mut self, mux: usize, length: usize) -> Result<(), Error> {
        let owned = self.is_owned(mux);
        if !owned {
            warn!("Dropping {} bytes for unknown socket {}", length, mux);
        }

        if owned && self.sockets[mux].rx.free() < length {
            warn!(
                "RX buffer of socket {} overflows, dropping {} bytes",
                mux,
                length - self.sockets[mux].rx.free()
            );
        }

        debug!("Receiving {} bytes for socket {}", length, mux);
        for _ in 0..length {
            let byte = match self.next_byte() {
                Ok(byte) => byte,
                Err(Error::Timeout) => return Err(self.desynchronize(Some(mux))),
                Err(error) => return Err(error),
            };

            if owned {
                // Overflow is already reported above
                let _ = self.sockets[mux].rx.put(byte);
            }
        }

        Ok(())
    }

    fn handle_link_closed(&mut self, prefix: &[u8], mux: MuxField, skip_line: bool) -> Result<(), Error> {
        let mux = match mux {
            MuxField::Implicit => Some(0),
            MuxField::Before => {
                let mux = trailing_decimal(self.response_head(prefix));
                if mux.is_none() {
                    warn!("Ignoring close notification without socket id");
                }
                mux
            }
            MuxField::After(delimiter) => match self.read_urc_field(delimiter, None)? {
                Some(mux) => Some(mux),
                None => return Err(self.desynchronize(None)),
            },
        };

        if skip_line {
            if let Err(error) = self.skip_until(b'\n') {
                return Err(self.on_field_error(error, mux));
            }
        }

        if let Some(mux) = mux {
            self.close_by_remote(mux);
        }

        Ok(())
    }

    /// Marks the socket as disconnected after the modem reported its link as closed
    pub(crate) fn close_by_remote(&mut self, mux: usize) {
        if mux >= self.mux_count() {
            warn!("Close notification for unknown socket {}", mux);
            return;
        }

        debug!("Socket {} closed by remote", mux);
        self.sockets[mux].mark_disconnected();
    }

    /// Reads a numeric notification field, desynchronizing if the transport goes silent
    fn read_urc_field(&mut self, delimiter: u8, mux: Option<usize>) -> Result<Option<usize>, Error> {
        self.read_field(delimiter).map_err(|error| self.on_field_error(error, mux))
    }

    pub(crate) fn on_field_error(&mut self, error: Error, mux: Option<usize>) -> Error {
        match error {
            Error::Timeout => self.desynchronize(mux),
            error => error,
        }
    }

    /// Response bytes in front of the matched prefix, holding fields which precede it
    fn response_head(&self, prefix: &[u8]) -> &[u8] {
        &self.response[..self.response.len().saturating_sub(prefix.len())]
    }

    /// Enters the desynchronized state and returns the matching error
    pub(crate) fn desynchronize(&mut self, mux: Option<usize>) -> Error {
        error!("Lost notification framing, resynchronization required");

        if let Some(mux) = mux {
            if mux < self.mux_count() {
                self.sockets[mux].mark_disconnected();
            }
        }

        self.desynchronized = true;
        Error::Desynchronized
    }

    /// True if the socket was handed out by `socket()`
    pub(crate) fn is_owned(&self, mux: usize) -> bool {
        mux < self.mux_count() && self.sockets[mux].owned
    }
}
