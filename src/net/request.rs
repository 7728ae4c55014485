// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fmt, sync::Arc};

use bytes::Bytes;

use crate::net::{codec::Message, connection::Connection};

/// The pair a handler sees: the originating connection and the parsed
/// message. Built only by the reader path; immutable afterwards.
#[derive(Clone)]
pub struct Request {
    conn: Arc<Connection>,
    msg: Message,
}

impl Request {
    pub(crate) fn new(conn: Arc<Connection>, msg: Message) -> Self {
        Self { conn, msg }
    }

    pub fn conn(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn msg(&self) -> &Message {
        &self.msg
    }

    pub fn msg_id(&self) -> u32 {
        self.msg.id()
    }

    pub fn data(&self) -> &Bytes {
        self.msg.data()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("conn_id", &self.conn.conn_id())
            .field("msg_id", &self.msg.id())
            .field("data_len", &self.msg.data_len())
            .finish()
    }
}
