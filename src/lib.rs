//! Lockbox - chunked, tamper-evident file containers.
//!
//! A password-protected container format with:
//! - PBKDF2-HMAC-SHA-256 key derivation and AES-256-GCM per chunk
//! - a tag table so every chunk is verified before it is written out
//! - an optional unencrypted password hint, shown only after a failed attempt
//! - batch processing across many files with a moving-average ETA

pub mod app;
pub mod batch;
pub mod cipher;
pub mod config;
pub mod container;
pub mod file;
pub mod header;
pub mod retry;
pub mod secret;
pub mod types;
pub mod ui;
