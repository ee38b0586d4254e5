// Licensed under the Apache-2.0 license

//! Control/status register compiler.
//!
//! This crate turns a declarative description of a hardware module's
//! memory-mapped registers into a synthesizable Verilog register file,
//! C accessors (embedded and host-simulation), testbench tasks and TeX
//! documentation tables. Every artifact is generated from one resolved
//! address table, so a register's address is the same everywhere.
//!
//! ## Usage
//!
//! ```
//! use csr_compiler::generate_csrs_from_str;
//!
//! let artifacts = generate_csrs_from_str(r#"
//!     name = "iob_timer"
//!     version = "0.1"
//!
//!     [[csrs]]
//!     name = "timer"
//!     descr = "Timer registers"
//!
//!     [[csrs.regs]]
//!     name = "enable"
//!     type = "W"
//!     n_bits = 1
//!
//!     [[csrs.regs]]
//!     name = "status"
//!     type = "R"
//!     n_bits = 32
//! "#).unwrap();
//!
//! assert_eq!(artifacts.table.address_of("status"), Some(4));
//! let header = artifacts.file("iob_timer_csrs.h").unwrap();
//! assert!(header.contents.contains("#define IOB_TIMER_STATUS_ADDR 4"));
//! ```
//!
//! ## Module Organization
//!
//! - [`expr`]: Parameter expressions and the parameter environment
//! - [`types`]: Validated module description ([`CsrModule`], [`Register`])
//! - [`config`]: Allocation and bus policy ([`CsrConfig`])
//! - [`alloc`]: Address allocation ([`allocate`], [`ResolvedTable`])
//! - [`output`]: Generated output types ([`HardwareFragment`], [`GeneratedFile`])
//! - [`error`]: Error type ([`CsrError`])
//! - [`util`]: Address arithmetic and text helpers

pub mod alloc;
pub mod config;
pub mod error;
pub mod expr;
pub mod output;
pub mod types;
pub mod util;

mod codegen;

// Re-export main public API
pub use crate::alloc::{
    allocate, allocate_with, OverlapPolicy, ResolvedTable, SharedCursor, SplitCursors,
};
pub use codegen::{generate_csrs, generate_csrs_from_file, generate_csrs_from_str};
pub use config::{CsrConfig, CsrInterface};
pub use error::{CsrError, Result};
pub use expr::{ParamEnv, ParamExpr, Valuation};
pub use output::{CsrArtifacts, GeneratedFile, HardwareFragment};
pub use types::{Access, CsrModule, Parameter, Register, RegisterGroup, RegisterTable};
