//! # Askora (Q&A forum backend)
//!
//! `askora` is the backend core of a question-and-answer forum. It covers
//! three areas:
//!
//! - **Sessions:** registration, login, guest identities, and logout. Each
//!   user holds a single refresh-token slot; refreshing rotates the slot and
//!   a replayed token revokes the whole session.
//! - **Voting:** an append-free ledger with at most one vote per
//!   `(user, target)`. Casting the same vote again withdraws it; casting the
//!   opposite vote flips it.
//! - **Acceptance:** a question's author may mark one of its answers as
//!   accepted.
//!
//! Storage is abstracted behind capability traits with a Postgres
//! implementation and an in-memory fake for tests.

pub mod acceptance;
pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod events;
pub mod ledger;
pub mod model;
pub mod store;
