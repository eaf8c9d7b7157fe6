//! Core domain concepts shared across all subdomains.
//!
//! - [`question::Question`]: a validated, non-empty user question
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod question;
pub mod string;
