use crate::adapter::Error;
use crate::matcher::Outcome;
use crate::stack::{ConnectionState, Socket};
use crate::tests::mock::{adapter, connected_adapter, MockAdapter};
use crate::variant::{ESP8266, M590};

/// Takes all bytes buffered for the given mux
fn buffered(adapter: &mut MockAdapter, mux: usize) -> Vec<u8> {
    let mut buffer = [0x0; 32];
    let length = adapter.sockets[mux].rx.get_slice(&mut buffer);
    buffer[..length].to_vec()
}

#[test]
fn test_data_push_during_maintenance() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,2,5:HELLO");

    assert_eq!(Outcome::Timeout, adapter.wait_response(10, &[]).unwrap());

    assert_eq!(5, adapter.available(&Socket::new(2)).unwrap());
    assert_eq!(b"HELLO".to_vec(), buffered(&mut adapter, 2));
    assert!(adapter.sockets[0].rx.is_empty());
}

#[test]
fn test_data_push_overflow_keeps_framing() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.sockets[0].rx.put_slice(b"abcdefghijklmnopqrstuvwxyz");
    adapter.transport.add_rx(b"+IPD,0,8:ABCDEFGHtail");

    let outcome = adapter.wait_response(1_000, &[b"tail"]).unwrap();

    assert_eq!(Outcome::Matched(1), outcome);
    assert_eq!(b"tail", adapter.response());
    assert_eq!(b"abcdefghijklmnopqrstuvwxyzABCDE".to_vec(), buffered(&mut adapter, 0));
    assert!(!adapter.is_desynchronized());
}

#[test]
fn test_data_push_payload_not_interpreted() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,0,10:OK\r\n+IPD,1\r\nOK\r\n");

    let outcome = adapter.wait_response(1_000, &[b"OK\r\n", b"ERROR\r\n"]).unwrap();

    assert_eq!(Outcome::Matched(1), outcome);
    assert_eq!(b"\r\nOK\r\n", adapter.response());
    assert_eq!(b"OK\r\n+IPD,1".to_vec(), buffered(&mut adapter, 0));
    assert!(adapter.sockets[1].rx.is_empty());
}

#[test]
fn test_data_push_leading_space_in_length() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,0, 3:abc");

    adapter.maintain().unwrap();
    assert_eq!(b"abc".to_vec(), buffered(&mut adapter, 0));
}

#[test]
fn test_data_push_unknown_mux_dropped() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,7,4:abcd\r\nOK\r\n");

    let outcome = adapter.wait_response(1_000, &[b"OK\r\n"]).unwrap();

    assert_eq!(Outcome::Matched(1), outcome);
    assert_eq!(b"\r\nOK\r\n", adapter.response());
    for slot in &adapter.sockets {
        assert!(slot.rx.is_empty());
        assert_eq!(ConnectionState::Open, slot.state);
    }
}

#[test]
fn test_data_push_unowned_socket_dropped() {
    let mut adapter = adapter(&ESP8266);
    adapter.open_socket().unwrap();
    adapter.transport.add_rx(b"+IPD,1,4:abcd");

    adapter.maintain().unwrap();

    assert!(adapter.sockets[1].rx.is_empty());
    assert!(adapter.transport.remaining().is_empty());
}

#[test]
fn test_data_push_malformed_length_desynchronizes() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,1,x3:abc\r\nOK\r\n");

    let result = adapter.wait_response(1_000, &[b"OK\r\n"]).unwrap_err();

    assert_eq!(Error::Desynchronized, result);
    assert!(adapter.is_desynchronized());
    assert_eq!(ConnectionState::Idle, adapter.sockets[1].state);
    assert_eq!(ConnectionState::Open, adapter.sockets[0].state);
}

#[test]
fn test_data_push_malformed_mux_desynchronizes() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,a,3:abc");

    assert_eq!(Error::Desynchronized, adapter.maintain().unwrap_err());
    for slot in &adapter.sockets {
        assert_eq!(ConnectionState::Open, slot.state);
    }
}

#[test]
fn test_data_push_overlong_field_desynchronizes() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,0,123456:abc");

    assert_eq!(Error::Desynchronized, adapter.maintain().unwrap_err());
    assert_eq!(ConnectionState::Idle, adapter.sockets[0].state);
}

#[test]
fn test_data_push_truncated_payload_desynchronizes() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,3,10:abc");

    assert_eq!(Error::Desynchronized, adapter.maintain().unwrap_err());
    assert_eq!(ConnectionState::Idle, adapter.sockets[3].state);
    assert_eq!(b"abc".to_vec(), buffered(&mut adapter, 3));
}

#[test]
fn test_desynchronized_until_resynchronize() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,0,?:garbage\r\nOK\r\n");

    assert_eq!(Error::Desynchronized, adapter.maintain().unwrap_err());
    assert_eq!(Error::Desynchronized, adapter.command(&[b"+GMR"], 100).unwrap_err());

    adapter.resynchronize().unwrap();
    adapter.transport.add_response(b"\r\nOK\r\n");
    adapter.command(&[b"+GMR"], 100).unwrap();
}

#[test]
fn test_link_closed_before_prefix() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"\r\n1,CLOSED\r\n");

    adapter.maintain().unwrap();

    assert_eq!(ConnectionState::Idle, adapter.sockets[1].state);
    assert_eq!(ConnectionState::Open, adapter.sockets[0].state);
    assert_eq!(ConnectionState::Open, adapter.sockets[2].state);
}

#[test]
fn test_link_closed_keeps_buffered_data() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"+IPD,0,3:bye0,CLOSED\r\n");

    adapter.maintain().unwrap();

    let socket = Socket::new(0);
    assert_eq!(ConnectionState::Idle, adapter.sockets[0].state);
    assert!(adapter.connected(&socket));
    assert_eq!(b"bye".to_vec(), buffered(&mut adapter, 0));
    assert!(!adapter.connected(&socket));
}

#[test]
fn test_link_closed_without_mux_ignored() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"\r\n,CLOSED\r\n");

    adapter.maintain().unwrap();

    assert!(!adapter.is_desynchronized());
    for slot in &adapter.sockets {
        assert_eq!(ConnectionState::Open, slot.state);
    }
}

#[test]
fn test_link_closed_unknown_mux_ignored() {
    let mut adapter = connected_adapter(&ESP8266);
    adapter.transport.add_rx(b"\r\n9,CLOSED\r\n");

    adapter.maintain().unwrap();

    for slot in &adapter.sockets {
        assert_eq!(ConnectionState::Open, slot.state);
    }
}

#[test]
fn test_link_closed_after_prefix_skips_line() {
    let mut adapter = connected_adapter(&M590);
    adapter.transport.add_rx(b"\r\n+TCPCLOSE:1,Link Closed\r\nrest");

    let outcome = adapter.wait_response(1_000, &[b"rest"]).unwrap();

    assert_eq!(Outcome::Matched(1), outcome);
    assert_eq!(b"rest", adapter.response());
    assert_eq!(ConnectionState::Idle, adapter.sockets[1].state);
    assert_eq!(ConnectionState::Open, adapter.sockets[0].state);
}

#[test]
fn test_data_push_length_delimited_by_comma() {
    let mut adapter = connected_adapter(&M590);
    adapter.transport.add_rx(b"\r\n+TCPRECV:1,5,hello\r\n");

    adapter.maintain().unwrap();

    assert_eq!(b"hello".to_vec(), buffered(&mut adapter, 1));
    assert!(adapter.sockets[0].rx.is_empty());
}
