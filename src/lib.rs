//! # Inviti
//!
//! `inviti` is a small HTTP backend for a closed community. Access is
//! bootstrapped by invitation: a user who may manage permissions mints a
//! one-time secret, hands it out-of-band to a newcomer, and the newcomer
//! exchanges it (together with a self-chosen numeric user id) for a signed
//! bearer credential. The credential carries two permission claims:
//! managing permissions (minting further secrets) and managing vacancy
//! records.
//!
//! ## Credential lifetime
//!
//! **Issued credentials never expire.** Verification checks the HMAC-SHA-512
//! signature and the fixed issuer/audience pair, and deliberately skips
//! lifetime validation. This mirrors the upstream design: secrets are
//! one-time, credentials are forever. If you need expiry, treat it as a new
//! feature, and plan key rotation accordingly.
//!
//! ## Storage
//!
//! Pending secrets and vacancies live in `PostgreSQL`. Consuming a secret is
//! a single `DELETE ... RETURNING` statement, so two concurrent exchanges of
//! the same secret can never both succeed. Schema files are under `db/sql/`
//! and are applied out-of-band.

pub mod cli;
pub mod inviti;
