// Licensed under the Apache-2.0 license

//! Code generation from a validated module description.
//!
//! [`generate_csrs`] runs the whole pipeline for one module:
//!
//! ```text
//! CsrModule ─► ParamEnv::resolve ─► register_table ─► allocate ─► ResolvedTable
//!                                                                    │
//!                         ┌──────────────────┬───────────────────┬───┴──────────────┐
//!                         ▼                  ▼                   ▼                  ▼
//!                     hardware           headers             software             docs
//!                  (fragment, .v)   (.vh, lparam .vs)  (.h, .c, verilator, tb)  (.tex tables)
//! ```
//!
//! The generators only read the resolved table, so they cannot disagree on
//! an address. Any failure aborts the run; no partial artifact set is
//! returned.
//!
//! The implementation is split across submodules:
//! - `hardware`: register file ports, decode and protocol state machine
//! - `headers`: Verilog address and width headers
//! - `software`: C accessors, host-simulation variant and testbench tasks
//! - `docs`: TeX register tables

mod docs;
mod hardware;
mod headers;
mod software;

use std::path::Path;

use log::debug;

use crate::alloc::{allocate, ResolvedRegister, ResolvedTable};
use crate::error::{CsrError, Result};
use crate::expr::{ParamEnv, Valuation};
use crate::output::{CsrArtifacts, GeneratedFile};
use crate::types::CsrModule;
use crate::util::{macro_prefix, verilog_max};

/// Shared, read-only inputs of every generator.
struct Context<'a> {
    module: &'a CsrModule,
    env: &'a ParamEnv,
    table: &'a ResolvedTable,
}

impl Context<'_> {
    fn top(&self) -> &str {
        &self.module.name
    }

    /// `IOB_TIMER_` for a module called `iob_timer`.
    fn prefix(&self) -> String {
        macro_prefix(&self.module.name)
    }

    fn bus_bytes(&self) -> u64 {
        self.module.config.bus_bytes()
    }

    /// Declared width in `value` mode, for reset-value headers and docs.
    fn value_bits(&self, reg: &ResolvedRegister) -> Result<i64> {
        reg.register.n_bits.eval(self.env, Valuation::Value)
    }
}

/// Width of a register's data signals as a Verilog expression.
fn signal_width(reg: &ResolvedRegister) -> String {
    verilog_max(reg.register.n_bits.source(), "1")
}

/// Whether software addresses the register with an element index.
fn is_array(reg: &ResolvedRegister) -> bool {
    reg.layout.n_items() > 1
}

/// Generates every artifact for `module`.
pub fn generate_csrs(module: &CsrModule) -> Result<CsrArtifacts> {
    let env = ParamEnv::resolve(&module.params)?;
    let table = module.register_table()?;
    let resolved = allocate(table, &env, &module.config)?;

    let ctx = Context {
        module,
        env: &env,
        table: &resolved,
    };
    let hardware = hardware::generate(&ctx)?;

    let mut files = vec![GeneratedFile::new(
        format!("{}_csrs.v", module.name),
        hardware.render(&format!("{}_csrs", module.name))?,
    )];
    files.extend(headers::generate(&ctx)?);
    files.extend(software::generate(&ctx)?);
    files.extend(docs::generate(&ctx)?);
    for file in &files {
        debug!("generated {} ({} bytes)", file.name, file.contents.len());
    }

    Ok(CsrArtifacts {
        table: resolved,
        hardware,
        files,
    })
}

/// Parses a TOML module description and generates its artifacts.
pub fn generate_csrs_from_str(text: &str) -> Result<CsrArtifacts> {
    generate_csrs(&CsrModule::from_toml_str(text)?)
}

/// Reads a TOML module description from `path` and generates its artifacts.
pub fn generate_csrs_from_file(path: &Path) -> Result<CsrArtifacts> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CsrError::config(format!("cannot read {}: {e}", path.display()))
    })?;
    generate_csrs_from_str(&text)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
