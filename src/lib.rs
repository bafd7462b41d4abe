//! # Chiavi (API Key Issuance & Validation)
//!
//! `chiavi` mints opaque bearer credentials scoped to a project and answers
//! high-frequency validation queries for upstream gateways.
//!
//! ## Credentials
//!
//! A bearer credential is `sk-proj.{project_id}.{key_id}.{secret}`. Only an
//! Argon2id verifier of the secret is persisted; the full credential is
//! handed out exactly once at mint time.
//!
//! ## Storage
//!
//! State lives in a single Redis keyspace: JSON documents for keys and
//! projects, a set per project for listing, a hash per key for usage
//! counters, a stream for the audit trail and per-minute counters for rate
//! limiting. Two store principals are used - a read-mostly `validator` for
//! the hot path and a read-write `manager` for administration - and the
//! split is mirrored in the type system.
//!
//! ## Validation pipeline
//!
//! parse → existence → disabled → expired → secret → rate limit, in that
//! order. Every denial renders the same response body; causes are visible
//! only in the `audit:keylookup` stream and the service logs.

pub mod admin;
pub mod api;
pub mod cli;
pub mod credential;
pub mod store;
pub mod validate;
pub mod verifier;
