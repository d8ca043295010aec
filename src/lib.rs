//! # Virtual sockets over AT command modems
//!
//! Drives a cellular or Wi-Fi modem over a single serial byte stream and exposes its data connections as
//! independent sockets. Pushed payload is demultiplexed into per socket receive buffers while commands are
//! running, so notifications for one socket may arrive during any operation of another one.
//!
//! The command dialect of the modem is described by a [Variant](variant::Variant). Presets for
//! [ESP8266](variant::ESP8266), [M590](variant::M590) and [XBee](variant::XBEE) are included.
//!
//! ## Overview
//! * [adapter]: Central [Adapter](adapter::Adapter), modem bring-up and raw command access
//! * [matcher]: Blocking response matching with notification dispatch
//! * [stack]: Socket API and [TcpClientStack](embedded_nal::TcpClientStack) implementation
//! * [fifo]: Receive ring buffer
//!
//! ## Logging
//! Internal events are logged via [log](https://docs.rs/log) or [defmt](https://docs.rs/defmt) when the
//! feature of the same name is enabled.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

#[macro_use]
mod fmt;

pub mod adapter;
pub(crate) mod commands;
pub mod config;
pub mod fifo;
pub(crate) mod helpers;
pub mod matcher;
pub mod stack;
pub mod urc;
pub mod variant;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
mod tests;
