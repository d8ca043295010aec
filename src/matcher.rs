//! # Response matcher
//!
//! [wait_response](Adapter::wait_response) scans the transport byte by byte until one of up to five terminal
//! patterns is received or the deadline elapses. Notifications of the variant (pushed socket data, closed
//! links) are recognized and handled on the fly during every wait call, no matter which operation issued it.
//!
//! Terminal patterns are checked before notification prefixes, so a terminal pattern wins if both match the
//! same suffix.
use crate::adapter::{Adapter, Error, Transport, RESPONSE_SIZE};
use crate::helpers::LossyStr;
use crate::urc::UrcPattern;
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Vec;

/// Max. number of terminal patterns considered by a wait call
pub const MAX_CANDIDATES: usize = 5;

/// Result of a wait call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// No terminal pattern was received before the deadline
    Timeout,

    /// Terminal pattern with the given index (starting at 1) was received
    Matched(usize),
}

impl Outcome {
    /// Terminal pattern index, 0 in case of a timeout
    pub fn index(&self) -> usize {
        match self {
            Outcome::Timeout => 0,
            Outcome::Matched(index) => *index,
        }
    }
}

impl<T: Transport, C: Timer<TIMER_HZ>, const TIMER_HZ: u32, const MUX: usize, const RX_SIZE: usize>
    Adapter<T, C, TIMER_HZ, MUX, RX_SIZE>
{
    /// Waits until one of the terminal patterns is received or the timeout elapses.
    ///
    /// Index 1 conventionally refers to the success marker and index 2 to the error marker. Patterns beyond
    /// the fifth one and empty patterns are ignored. Notifications received in the meantime are handled and
    /// never end the call.
    ///
    /// Returns [Error::Desynchronized] if the fields of a notification could not be parsed.
    pub fn wait_response(&mut self, timeout_ms: u32, candidates: &[&[u8]]) -> Result<Outcome, Error> {
        self.assert_synchronized()?;
        self.response.clear();

        let candidates = &candidates[..candidates.len().min(MAX_CANDIDATES)];
        let deadline = self.deadline(timeout_ms);

        loop {
            self.yield_now();

            while let Some(byte) = self.try_read_byte()? {
                // Noise caused by transport glitches
                if byte == 0x0 {
                    continue;
                }

                self.append_response(byte);

                if let Some(index) = self.match_candidates(candidates) {
                    trace!("Matched pattern {}: {:?}", index, LossyStr(&self.response));
                    return Ok(Outcome::Matched(index));
                }

                if let Some(pattern) = self.match_urc() {
                    self.handle_urc(pattern)?;
                    self.response.clear();
                }
            }

            if self.is_expired(deadline) {
                trace!("Timeout after {} ms: {:?}", timeout_ms, LossyStr(&self.response));
                return Ok(Outcome::Timeout);
            }
        }
    }

    /// Short passive wait without terminal patterns, giving pending notifications the chance to get handled
    pub fn maintain(&mut self) -> Result<(), Error> {
        self.wait_response(self.config.maintain_timeout_ms, &[])?;
        Ok(())
    }

    fn match_candidates(&self, candidates: &[&[u8]]) -> Option<usize> {
        candidates
            .iter()
            .position(|candidate| !candidate.is_empty() && self.response.ends_with(candidate))
            .map(|position| position + 1)
    }

    fn match_urc(&self) -> Option<&'static UrcPattern> {
        let variant = self.variant;
        variant
            .urcs
            .iter()
            .find(|pattern| !pattern.prefix.is_empty() && self.response.ends_with(pattern.prefix))
    }

    /// Appends a byte, dropping the older half of the buffer if full
    fn append_response(&mut self, byte: u8) {
        if self.response.is_full() {
            let keep = RESPONSE_SIZE / 2;
            let start = self.response.len() - keep;
            self.response.copy_within(start.., 0);
            self.response.truncate(keep);
        }

        // Capacity is ensured above
        let _ = self.response.push(byte);
    }

    /// Reads a byte if one is available, never blocks
    pub(crate) fn try_read_byte(&mut self) -> Result<Option<u8>, Error> {
        if !self.transport.read_ready().map_err(|_| Error::Read)? {
            return Ok(None);
        }

        let mut buffer = [0x0; 1];
        match self.transport.read(&mut buffer).map_err(|_| Error::Read)? {
            0 => Ok(None),
            _ => Ok(Some(buffer[0])),
        }
    }

    /// Reads the next byte, waiting at most the payload timeout for it
    pub(crate) fn next_byte(&mut self) -> Result<u8, Error> {
        let deadline = self.deadline(self.config.payload_timeout_ms);

        loop {
            if let Some(byte) = self.try_read_byte()? {
                return Ok(byte);
            }

            if self.is_expired(deadline) {
                return Err(Error::Timeout);
            }

            self.yield_now();
        }
    }

    /// Reads a decimal field terminated by the given delimiter. Leading spaces are skipped.
    /// Returns None if the field is malformed, the delimiter is consumed in any case.
    pub(crate) fn read_field(&mut self, delimiter: u8) -> Result<Option<usize>, Error> {
        let mut value: usize = 0;
        let mut digits = 0;

        loop {
            let byte = self.next_byte()?;

            match byte {
                _ if byte == delimiter && digits > 0 => return Ok(Some(value)),
                b' ' if digits == 0 => {}
                b'0'..=b'9' if digits < 5 => {
                    value = value * 10 + usize::from(byte - b'0');
                    digits += 1;
                }
                _ => {
                    error!("Unexpected byte {:?} in numeric field", byte);
                    return Ok(None);
                }
            }
        }
    }

    /// Consumes bytes up to and including the given one
    pub(crate) fn skip_until(&mut self, end: u8) -> Result<(), Error> {
        while self.next_byte()? != end {}
        Ok(())
    }

    /// Reads a line up to the given end byte (excluded)
    pub(crate) fn read_line<const L: usize>(&mut self, end: u8) -> Result<Vec<u8, L>, Error> {
        let mut line = Vec::new();

        loop {
            let byte = self.next_byte()?;
            if byte == end {
                return Ok(line);
            }

            line.push(byte).map_err(|_| Error::InvalidResponse)?;
        }
    }

    /// Blocks for the given time, calling the yield hook meanwhile
    pub(crate) fn delay_ms(&mut self, ms: u32) {
        let deadline = self.deadline(ms);

        while !self.is_expired(deadline) {
            self.yield_now();
        }
    }

    pub(crate) fn deadline(&mut self, ms: u32) -> TimerInstantU32<TIMER_HZ> {
        self.timer.now() + TimerDurationU32::<TIMER_HZ>::millis(ms)
    }

    /// Milliseconds left until the deadline, 0 if already expired
    pub(crate) fn remaining_ms(&mut self, deadline: TimerInstantU32<TIMER_HZ>) -> u32 {
        let now = self.timer.now();
        deadline.checked_duration_since(now).map_or(0, |left| left.to_millis())
    }

    pub(crate) fn is_expired(&mut self, deadline: TimerInstantU32<TIMER_HZ>) -> bool {
        self.timer.now() >= deadline
    }

    pub(crate) fn yield_now(&self) {
        if let Some(hook) = self.config.yield_hook {
            hook();
        }
    }
}
