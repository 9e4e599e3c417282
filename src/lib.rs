//! Blacklist Verification Service Library
//!
//! Verifies an identification against the defraudadores, restringido and
//! externas blacklists concurrently and returns one consolidated verdict.
//!
//! # Modules
//!
//! - `aggregation`: Concurrent fan-out and aggregation engine.
//! - `circuit_breaker`: Per-backend circuit breaker.
//! - `config`: Configuration management.
//! - `errors`: Error taxonomy and caller-facing faults.
//! - `handlers`: HTTP request handlers.
//! - `identification`: Identification format/type validation.
//! - `models`: Request, call outcome and verdict models.
//! - `orchestrator`: Per-request verification pipeline.
//! - `services`: Blacklist backend clients.
//! - `validator`: Single backend response validation.
//! - `verdict`: Verdict construction.

pub mod aggregation;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod identification;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod validator;
pub mod verdict;
