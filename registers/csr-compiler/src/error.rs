// Licensed under the Apache-2.0 license

//! Error taxonomy for the CSR compiler.
//!
//! Every error is fatal for the build that raised it: no generator returns a
//! partial artifact set.

use thiserror::Error;

/// Errors raised while validating, allocating or generating CSRs.
#[derive(Error, Debug)]
pub enum CsrError {
    /// Missing or malformed field in the module description, empty register
    /// table, or a register the hardware generator cannot realize.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Misaligned, out-of-order, missing or unexpected register address.
    #[error("address error in register `{register}`: {reason}")]
    Address { register: String, reason: String },

    /// An expression that does not reduce to a number.
    #[error("expression error: `{expression}` evaluated to `{substituted}`: {reason}")]
    Expression {
        expression: String,
        substituted: String,
        reason: String,
    },

    /// A register whose byte width has no software word type.
    #[error("type error in register `{register}`: {bytes} bytes has no matching word type")]
    Type { register: String, bytes: u64 },

    #[error("failed to deserialize module description: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to format generated text")]
    Format(#[from] std::fmt::Error),
}

impl CsrError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CsrError::Configuration(msg.into())
    }

    pub(crate) fn address(register: &str, reason: impl Into<String>) -> Self {
        CsrError::Address {
            register: register.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn expression(
        expression: &str,
        substituted: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CsrError::Expression {
            expression: expression.to_string(),
            substituted: substituted.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for CSR compiler operations
pub type Result<T> = std::result::Result<T, CsrError>;
