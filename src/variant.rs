//! # Modem variants
//!
//! A [Variant] describes everything the [Adapter](crate::adapter::Adapter) needs to know about one modem family:
//! command strings, terminal patterns, the notification table and whether sockets are framed command-per-packet
//! or as a single transparent stream. Variants are plain static values, so new modems are supported by
//! declaring a new table instead of adapting the engine.
//!
//! The following presets are included:
//! * [ESP8266]: IP command dialect (`CIPSTART`/`CIPSEND`/`CIPCLOSE`) with up to five sockets
//! * [M590]: reduced socket dialect (`TCPSETUP`/`TCPSEND`/`TCPCLOSE`) with two sockets and DNS pre-resolution
//! * [XBEE]: single transparent socket, configured in command mode entered by guard time + escape sequence
use crate::urc::{MuxField, UrcAction, UrcPattern};

/// Capability table of one modem family
#[derive(Debug)]
pub struct Variant {
    /// Human readable name, used for logging
    pub name: &'static str,

    /// Number of sockets the modem is able to multiplex. 1 for single socket variants.
    pub mux_count: usize,

    /// Line terminator appended to every command, e.g. CR+LF or bare CR
    pub line_terminator: &'static [u8],

    /// Final success response of a regular command
    pub ok: &'static [u8],

    /// Final error response of a regular command
    pub error: &'static [u8],

    /// Default timeout for regular commands
    pub command_timeout_ms: u32,

    /// Recommended RX buffer size per socket
    pub rx_buffer_size: usize,

    /// Commands (without AT prefix) sent by `init()`, each expecting the ok response
    pub init_commands: &'static [&'static str],

    /// Asynchronous notifications, checked in the given order
    pub urcs: &'static [UrcPattern],

    /// Socket framing and the command sequences for it
    pub framing: Framing,
}

/// How socket payload is transported over the serial line
#[derive(Debug)]
pub enum Framing {
    /// Each packet is sent by a command and received by a notification
    Packet(PacketDialect),

    /// All bytes outside of command mode are raw payload of a single socket
    Transparent(TransparentDialect),
}

/// Terminal patterns of one command step and which of them count as success
#[derive(Debug)]
pub struct Reply {
    /// Up to five terminal patterns. Index 1 refers to the first pattern.
    pub patterns: &'static [&'static [u8]],

    /// Pattern indices treated as success
    pub success: &'static [usize],

    /// Consume the remaining line after a successful match
    pub skip_line: bool,

    /// Success pattern is followed by the mux id and the given delimiter. Matches naming another socket are
    /// remote close notifications of that socket and don't end the exchange.
    pub mux_echo: Option<u8>,

    /// Final response the modem sends after the given success index, awaited and dropped
    pub trailer: Option<(usize, &'static [u8])>,
}

impl Reply {
    /// Returns true if the given terminal index counts as success
    pub fn is_success(&self, index: usize) -> bool {
        self.success.contains(&index)
    }
}

/// DNS lookup which needs to be done before connecting, as the connect command just accepts IP addresses
#[derive(Debug)]
pub struct DnsQuery {
    /// Lookup command, the quoted host name is appended
    pub command: &'static str,

    /// Prefix of the line carrying the resolved address
    pub answer: &'static [u8],

    /// Final response after the answer line
    pub done: &'static [u8],
}

/// Command sequences of command-per-packet dialects
#[derive(Debug)]
pub struct PacketDialect {
    /// Connect command, followed by `[mux,][protocol]host,port`
    pub connect_command: &'static str,

    /// Protocol field including its delimiter, e.g. `"TCP",`
    pub protocol: Option<&'static str>,

    /// Host is enclosed by quotes
    pub quote_host: bool,

    /// Host names need to be resolved first
    pub resolve: Option<DnsQuery>,

    pub connect_reply: Reply,

    /// Send command, followed by `[mux,]length`
    pub send_command: &'static str,

    /// Prompt signaling that the modem accepts payload
    pub prompt: Reply,

    /// Bytes written after the payload
    pub payload_suffix: &'static [u8],

    /// Confirmation after the payload was written
    pub send_reply: Reply,

    /// Max. payload length of a single send command
    pub max_chunk: usize,

    /// Close command, followed by `[mux]` and the suffix
    pub close_command: &'static str,
    pub close_suffix: &'static str,
    pub close_reply: Reply,
}

/// Configuration commands of a single socket transparent stream
#[derive(Debug)]
pub struct TransparentDialect {
    /// Silence before and after the escape sequence
    pub guard_time_ms: u32,

    /// Sequence switching from transparent to command mode
    pub escape: &'static [u8],

    /// Host name lookup, answered by the address and the line terminator
    pub resolve_command: &'static str,

    /// Sets the destination IP address
    pub address_command: &'static str,

    /// Sets the destination port (hexadecimal)
    pub port_command: &'static str,

    /// Drops the current connection
    pub close_command: &'static str,

    /// Leaves command mode
    pub exit_command: &'static str,
}

/// Espressif ESP8266 with AT firmware in multi connection mode
pub static ESP8266: Variant = Variant {
    name: "ESP8266",
    mux_count: 5,
    line_terminator: b"\r\n",
    ok: b"OK\r\n",
    error: b"ERROR\r\n",
    command_timeout_ms: 1_000,
    rx_buffer_size: 512,
    init_commands: &["E0", "+CIPMUX=1"],
    urcs: &[
        UrcPattern {
            prefix: b"+IPD,",
            action: UrcAction::DataPush {
                mux: MuxField::After(b','),
                length_end: b':',
            },
        },
        UrcPattern {
            prefix: b",CLOSED",
            action: UrcAction::LinkClosed {
                mux: MuxField::Before,
                skip_line: false,
            },
        },
    ],
    framing: Framing::Packet(PacketDialect {
        connect_command: "+CIPSTART=",
        protocol: Some("\"TCP\","),
        quote_host: true,
        resolve: None,
        connect_reply: Reply {
            patterns: &[b"OK\r\n", b"ERROR\r\n", b"ALREADY CONNECTED\r\n"],
            success: &[1, 3],
            skip_line: false,
            mux_echo: None,
            trailer: Some((3, b"ERROR\r\n".as_slice())),
        },
        send_command: "+CIPSEND=",
        prompt: Reply {
            patterns: &[b">", b"ERROR\r\n"],
            success: &[1],
            skip_line: false,
            mux_echo: None,
            trailer: None,
        },
        payload_suffix: b"",
        send_reply: Reply {
            patterns: &[b"SEND OK\r\n", b"SEND FAIL\r\n", b"ERROR\r\n"],
            success: &[1],
            skip_line: false,
            mux_echo: None,
            trailer: None,
        },
        max_chunk: 2048,
        close_command: "+CIPCLOSE=",
        close_suffix: "",
        close_reply: Reply {
            patterns: &[b"OK\r\n", b"ERROR\r\n"],
            success: &[1],
            skip_line: false,
            mux_echo: None,
            trailer: None,
        },
    }),
};

/// Neoway M590 GSM module using its internal TCP stack
pub static M590: Variant = Variant {
    name: "M590",
    mux_count: 2,
    line_terminator: b"\r\n",
    ok: b"OK\r\n",
    error: b"ERROR\r\n",
    command_timeout_ms: 1_000,
    rx_buffer_size: 256,
    init_commands: &["E0"],
    urcs: &[
        UrcPattern {
            prefix: b"+TCPRECV:",
            action: UrcAction::DataPush {
                mux: MuxField::After(b','),
                length_end: b',',
            },
        },
        UrcPattern {
            prefix: b"+TCPCLOSE:",
            action: UrcAction::LinkClosed {
                mux: MuxField::After(b','),
                skip_line: true,
            },
        },
    ],
    framing: Framing::Packet(PacketDialect {
        connect_command: "+TCPSETUP=",
        protocol: None,
        quote_host: false,
        resolve: Some(DnsQuery {
            command: "+DNS=",
            answer: b"+DNS:",
            done: b"+DNS:OK\r\n",
        }),
        connect_reply: Reply {
            patterns: &[b",OK\r\n", b",FAIL\r\n", b"+TCPSETUP:Error\r\n"],
            success: &[1],
            skip_line: false,
            mux_echo: None,
            trailer: None,
        },
        send_command: "+TCPSEND=",
        prompt: Reply {
            patterns: &[b"\r\n>", b"ERROR\r\n"],
            success: &[1],
            skip_line: false,
            mux_echo: None,
            trailer: None,
        },
        payload_suffix: b"\r",
        send_reply: Reply {
            patterns: &[b"\r\n+TCPSEND:", b"ERROR\r\n"],
            success: &[1],
            skip_line: true,
            mux_echo: None,
            trailer: None,
        },
        max_chunk: 1024,
        close_command: "+TCPCLOSE=",
        close_suffix: "",
        close_reply: Reply {
            patterns: &[b"+TCPCLOSE:", b"ERROR\r\n"],
            success: &[1],
            skip_line: true,
            mux_echo: Some(b','),
            trailer: None,
        },
    }),
};

/// Digi XBee cellular/Wi-Fi module in transparent mode
pub static XBEE: Variant = Variant {
    name: "XBee",
    mux_count: 1,
    line_terminator: b"\r",
    ok: b"OK\r",
    error: b"ERROR\r",
    command_timeout_ms: 1_000,
    rx_buffer_size: 256,
    init_commands: &["AP0"],
    urcs: &[],
    framing: Framing::Transparent(TransparentDialect {
        guard_time_ms: 1_000,
        escape: b"+++",
        resolve_command: "LA",
        address_command: "DL",
        port_command: "DE",
        close_command: "TM0",
        exit_command: "CN",
    }),
};
