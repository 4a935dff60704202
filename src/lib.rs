// Copyright 2026 The hostgraft Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(dead_code)]

//! # hostgraft
//!
//! A load-time instrumentation and reflective adapter framework for closed,
//! version-pinned host applications. `hostgraft` rewrites selected compiled
//! methods of a host as they load - preserving their structural validity -
//! and implements a stable public API over the host's otherwise-opaque,
//! name-obfuscated object model, purely by structural introspection.
//!
//! ## Features
//!
//! - **Load-time rewriting** - Four rewrite actions (guarded call-out, full
//!   replace, field override, pre-return injection) over an instruction-list
//!   abstraction with exact offset and exception-table remapping
//! - **Structural verification** - Every rewritten body is re-verified
//!   (operand stack and local typing) before it is committed
//! - **Signature-based binding** - Logical operations resolve to unnamed
//!   host members by pinned name plus shape, memoized per concrete class
//! - **Classification** - Concrete host classes map to API variants by
//!   one-time ancestor-chain inspection
//! - **Two-phase handshake** - A compatibility marker verified at connection
//!   time and enforced at join time, closing the in-between window
//! - **Failure isolation** - Nothing in this crate may crash the host: hook
//!   bodies and the transform engine absorb their own failures
//!
//! ## Quick Start
//!
//! ```rust
//! use hostgraft::prelude::*;
//!
//! // Pin the profile and policy for the targeted host build, then install.
//! let ctx = GraftContext::new(HostProfile::pinned(), HandshakeTable::new(true, "0.1.0"));
//! let agent = GraftAgent::install(ctx, pinned_rules());
//!
//! // Wire into the host's class-loading pipeline: offer every class blob.
//! // `None` means "load the original bytes unchanged".
//! assert!(agent.instrument("unrelated_class", &[]).is_none());
//! ```
//!
//! ## Architecture
//!
//! Data flows one way at class-load time and the other way at run time:
//!
//! - [`agent`] - Bootstrap: installs the engine before host startup and
//!   widens hook visibility through a linkage table
//! - [`transform`] - The class transform engine and its pinned rules
//! - [`bytecode`] - The instruction-list seam: codec, editor, verifier
//! - [`class`] - The host's compiled class format
//! - [`dispatch`] - Entry points injected code calls; event bus
//! - [`adapter`] - The reflective public API over live host objects
//! - [`host`] - The opaque live-object boundary the embedder implements
//! - [`handshake`] - The two-phase compatibility gate
//! - [`context`] - The explicit owner of every shared cache
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Two
//! categories deliberately never surface: adapter accessors recover to
//! documented defaults, and transform failures leave classes unmodified.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

pub mod adapter;
pub mod agent;
pub mod bytecode;
pub mod class;
pub mod context;
pub mod dispatch;
pub mod handshake;
pub mod host;
pub mod prelude;
pub mod transform;

/// `hostgraft` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `hostgraft` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// The installed instrumentation core - the root object an embedder creates.
pub use agent::GraftAgent;

/// The explicit context owning every shared cache.
pub use context::GraftContext;
