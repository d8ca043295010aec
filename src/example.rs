//! Mocks for doc examples
use core::convert::Infallible;
use embedded_io::{ErrorType, Read, ReadReady, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::{Deque, Vec};

/// ESP8266 serial mock, answering a fixed set of commands
#[derive(Default)]
pub struct ExampleTransport {
    /// Bytes ready to be read by the adapter
    rx: Deque<u8, 256>,

    /// Bytes written since the last flush
    tx: Vec<u8, 256>,
}

impl ExampleTransport {
    fn respond(&mut self, response: &[u8]) {
        for byte in response {
            let _ = self.rx.push_back(*byte);
        }
    }
}

impl ErrorType for ExampleTransport {
    type Error = Infallible;
}

impl Read for ExampleTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
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

impl ReadReady for ExampleTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl Write for ExampleTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let length = buf.len().min(self.tx.capacity() - self.tx.len());
        let _ = self.tx.extend_from_slice(&buf[..length]);
        Ok(length)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let request = core::mem::take(&mut self.tx);

        match &request[..] {
            b"AT\r\n" | b"ATE0\r\n" | b"AT+CIPMUX=1\r\n" => self.respond(b"\r\nOK\r\n"),
            b"AT+GMR\r\n" => self.respond(b"\r\nAT version:1.7.4.0\r\nSDK version:3.0.4\r\n\r\nOK\r\n"),
            b"AT+CIPSTART=0,\"TCP\",\"10.0.0.1\",21\r\n" => self.respond(b"0,CONNECT\r\n\r\nOK\r\n"),
            b"AT+CIPSEND=0,6\r\n" => self.respond(b"\r\nOK\r\n> "),
            b"hallo!" => self.respond(b"\r\nRecv 6 bytes\r\n\r\nSEND OK\r\n\r\n+IPD,0,16:nice to see you!"),
            b"AT+CIPCLOSE=0\r\n" => self.respond(b"0,CLOSED\r\n\r\nOK\r\n"),
            _ => self.respond(b"\r\nERROR\r\n"),
        }

        Ok(())
    }
}

/// Timer mock, advancing one millisecond on every query
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
}

impl Timer<1_000> for ExampleTimer {
    type Error = Infallible;

    fn now(&mut self) -> TimerInstantU32<1_000> {
        self.ticks = self.ticks.wrapping_add(1);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}
