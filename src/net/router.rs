// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use async_trait::async_trait;

use crate::net::request::Request;

/// The handler trio bound to one message id.
///
/// The three methods run in order on each request, on whichever worker
/// the originating connection hashes to. Requests from one connection are
/// always seen in arrival order; nothing else about scheduling may be
/// assumed. Every method defaults to a no-op so implementors override
/// only what they need.
#[async_trait]
pub trait Router: Send + Sync {
    async fn pre_handle(&self, _req: &Request) {}

    async fn handle(&self, _req: &Request) {}

    async fn post_handle(&self, _req: &Request) {}
}
