use crate::adapter::{Adapter, Error};
use crate::config::Config;
use crate::matcher::Outcome;
use crate::stack::ConnectionState;
use crate::tests::mock::{adapter, connected_adapter, MockClock, MockTransport};
use crate::variant::{ESP8266, XBEE};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_init_correct_commands() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"ATE0\r\n\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");

    adapter.init().unwrap();

    assert_eq!(
        vec!["AT\r\n", "ATE0\r\n", "AT+CIPMUX=1\r\n"],
        adapter.transport.sent_as_strings()
    );
    adapter.transport.assert_all_responses_sent();
}

#[test]
fn test_init_discards_pending_input() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_rx(b"\r\nready\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");

    adapter.init().unwrap();
    assert!(adapter.transport.remaining().is_empty());
}

#[test]
fn test_init_disconnects_sockets() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.sockets[1].rx.put_slice(b"stale");
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");

    adapter.init().unwrap();

    for slot in &adapter.sockets {
        assert_eq!(ConnectionState::Idle, slot.state);
        assert!(slot.rx.is_empty());
    }
}

#[test]
fn test_init_command_rejected() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.transport.add_response(b"\r\nERROR\r\n");

    assert_eq!(Error::Rejected, adapter.init().unwrap_err());
}

#[test]
fn test_init_transparent_variant_in_command_mode() {
    let mut adapter = adapter(&XBEE);
    adapter.transport.add_response(b"OK\r");
    adapter.transport.add_response(b"OK\r");
    adapter.transport.add_response(b"OK\r");

    adapter.init().unwrap();

    assert_eq!(vec!["+++", "ATAP0\r", "ATCN\r"], adapter.transport.sent_as_strings());
    assert!(!adapter.command_mode);
}

#[test]
fn test_test_at_retries_until_ok() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_silence();
    adapter.transport.add_response(b"\r\nOK\r\n");

    adapter.test_at(5_000).unwrap();
    assert_eq!(vec!["AT\r\n", "AT\r\n"], adapter.transport.sent_as_strings());
}

#[test]
fn test_test_at_timeout() {
    let mut adapter = adapter(&ESP8266);

    assert_eq!(Error::Timeout, adapter.test_at(1_000).unwrap_err());
    assert!(adapter.transport.sent.len() > 1);
}

#[test]
fn test_send_command_line_terminator() {
    let mut adapter = adapter(&XBEE);

    adapter.send_command(&[b"DL", b"10.0.0.1"]).unwrap();
    assert_eq!(vec!["ATDL10.0.0.1\r"], adapter.transport.sent_as_strings());
}

#[test]
fn test_send_command_overflow() {
    let mut adapter = adapter(&ESP8266);

    let result = adapter.send_command(&[&[b'A'; 300]]).unwrap_err();
    assert_eq!(Error::CommandOverflow, result);
    assert!(adapter.transport.sent.is_empty());
}

#[test]
fn test_send_command_write_error() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.write_error = true;

    assert_eq!(Error::Write, adapter.send_command(&[b"+GMR"]).unwrap_err());
}

#[test]
fn test_command_ok() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_response(b"\r\nAT version:1.7.4.0\r\n\r\nOK\r\n");

    adapter.command(&[b"+GMR"], 1_000).unwrap();
    assert!(adapter.response().starts_with(b"\r\nAT version"));
}

#[test]
fn test_command_rejected() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_response(b"\r\nERROR\r\n");

    assert_eq!(Error::Rejected, adapter.command(&[b"+CWMODE=9"], 1_000).unwrap_err());
}

#[test]
fn test_command_timeout() {
    let mut adapter = adapter(&ESP8266);
    adapter.transport.add_silence();

    assert_eq!(Error::Timeout, adapter.command(&[b"+GMR"], 100).unwrap_err());
}

#[test]
fn test_desynchronized_fails_fast() {
    let mut adapter = adapter(&ESP8266);
    adapter.desynchronized = true;
    adapter.transport.add_rx(b"\r\nOK\r\n");

    assert_eq!(Error::Desynchronized, adapter.send_command(&[b"+GMR"]).unwrap_err());
    assert_eq!(Error::Desynchronized, adapter.write_payload(&[b"data"]).unwrap_err());
    assert_eq!(Error::Desynchronized, adapter.wait_response(100, &[b"OK\r\n"]).unwrap_err());
    assert!(adapter.transport.sent.is_empty());
}

#[test]
fn test_resynchronize_discards_input() {
    let mut adapter = adapter(&ESP8266);
    adapter.desynchronized = true;
    adapter.transport.add_rx(b"garbage after lost framing");

    adapter.resynchronize().unwrap();

    assert!(!adapter.is_desynchronized());
    assert!(adapter.transport.remaining().is_empty());
    assert!(adapter.response().is_empty());
}

#[test]
fn test_mux_count_limited_by_table_size() {
    let adapter: Adapter<_, _, 1_000, 2, 16> = Adapter::new(MockTransport::new(), MockClock::default(), &ESP8266);
    assert_eq!(2, adapter.mux_count());
}

static YIELD_COUNT: AtomicUsize = AtomicUsize::new(0);

fn count_yield() {
    YIELD_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[test]
fn test_yield_hook_called_while_waiting() {
    let config = Config::new().yield_hook(count_yield);
    let mut adapter: Adapter<_, _, 1_000, 5, 16> =
        Adapter::with_config(MockTransport::new(), MockClock::default(), &ESP8266, config);

    assert_eq!(Outcome::Timeout, adapter.wait_response(50, &[b"OK\r\n"]).unwrap());
    assert!(YIELD_COUNT.load(Ordering::Relaxed) >= 50);
}

#[test]
fn test_release() {
    let mut adapter = adapter(&ESP8266);
    adapter.send_command(&[]).unwrap();

    let (transport, _) = adapter.release();
    assert_eq!(vec![b"AT\r\n".to_vec()], transport.sent);
}
