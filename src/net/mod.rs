// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Wire framing.
pub mod codec;
/// Per-socket state machine.
pub mod connection;
/// Router table and worker pool.
pub mod dispatch;
/// Error kinds of the connection engine.
pub mod error;
/// Timeout/cancellation plumbing shared by the I/O loops.
pub mod io;
/// Registry of live connections.
pub mod registry;
/// Handler-visible request pair.
pub mod request;
/// The handler trio seam.
pub mod router;
/// Accept loop and top-level lifecycle.
pub mod server;

pub use codec::{CodecError, FrameHeader, HEADER_LEN, Message};
pub use connection::Connection;
pub use dispatch::Dispatcher;
pub use error::NetError;
pub use registry::ConnRegistry;
pub use request::Request;
pub use router::Router;
pub use server::{Server, ServerCore};
