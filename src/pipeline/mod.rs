//! Pipeline stages for batch PDF conversion.
//!
//! Each submodule implements exactly one stage. Keeping stages separate
//! makes each independently testable: discovery and asset renaming are pure
//! filesystem code, the uploader and poller talk to the network through
//! [`crate::client::MineruClient`], and the poller's state machine can be
//! driven by a fake [`crate::client::StatusSource`] in tests.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ upload ──▶ poll ──▶ unpack ──▶ assets
//! (pdf list)   (PUT)      (status)  (zip)      (renumber)
//! ```
//!
//! 1. [`discover`] — find and validate the PDFs going into the batch
//! 2. [`upload`]   — push each file to its pre-signed target, sequentially,
//!    isolating per-file failure
//! 3. [`poll`]     — drive each file's `pending → {done, failed, timeout}`
//!    state machine off the batch status endpoint
//! 4. [`unpack`]   — extract a result archive into scratch space and relocate
//!    the primary document and asset directories; runs in `spawn_blocking`
//!    because zip extraction is synchronous fs work
//! 5. [`assets`]   — renumber asset files and rewrite references to them in
//!    the primary document

pub mod assets;
pub mod discover;
pub mod poll;
pub mod unpack;
pub mod upload;
