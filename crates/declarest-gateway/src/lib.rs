// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway: route synthesis plus live notifications.
//!
//! [`synthesize`] turns a set of [`ResourceBinding`]s into an axum [`Router`]
//! carrying a full validated CRUD surface per resource. Mutations publish
//! [`NotifyEvent`]s through the injected sink; [`WsHub`] is the bundled
//! WebSocket transport for them.
//!
//! [`Router`]: axum::Router
//! [`NotifyEvent`]: declarest_core::NotifyEvent

pub mod auth;
pub mod server;
pub mod synth;
pub mod ws;

pub use auth::{auth_middleware, AuthState, Identity, RequestVerifier, StaticTokenVerifier};
pub use server::{health_router, start_server, ServerConfig};
pub use synth::{synthesize, ApiError, CustomRoute, GatewayContext, ResourceBinding, RouteAuth};
pub use ws::WsHub;
