//! Error taxonomy for the orchestration loop surface.
//!
//! Only two classes can surface from a query: an oracle failure (the loop
//! cannot proceed without its decision maker) and invalid configuration.
//! Everything else — tool failures, parse ambiguity, exhaustion — is absorbed
//! by the loop and expressed in the conversation or the returned answer.

use thiserror::Error;

use crate::oracle::OracleError;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Calling the model oracle failed. Fatal for this query.
    #[error("model oracle failure: {0}")]
    Oracle(#[from] OracleError),

    /// Configuration is invalid or missing required fields.
    #[error("configuration error: {0}")]
    Configuration(String),
}
