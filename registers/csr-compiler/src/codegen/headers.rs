// Licensed under the Apache-2.0 license

//! Verilog headers with register addresses and widths.

use std::fmt::Write;

use super::{signal_width, Context};
use crate::alloc::{RegisterLayout, ResolvedRegister};
use crate::error::Result;
use crate::expr::Valuation;
use crate::output::GeneratedFile;
use crate::util::{ceil_log2, macro_prefix, verilog_max};

/// Address-width expression of an array register, kept symbolic when its
/// depth is.
fn verilog_addr_w(reg: &ResolvedRegister) -> String {
    let bytes_w = ceil_log2(reg.layout.n_bytes);
    let depth = &reg.register.log2n_items;
    match depth.as_literal() {
        Some(log2n_items) => (log2n_items + i64::from(bytes_w)).to_string(),
        None if bytes_w == 0 => depth.source().to_string(),
        None => format!("{depth}+{bytes_w}"),
    }
}

/// `<top>_csrs_conf.vh`: default value of every parameter that has one.
fn config_header(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = macro_prefix(&format!("{}_csrs", ctx.top()));
    let mut out = String::new();
    for param in &ctx.module.params {
        if let Some(value) = &param.value {
            let value = value.eval(ctx.env, Valuation::Value)?;
            writeln!(out, "`define {prefix}{} {value}", param.name.to_uppercase())?;
        }
    }
    Ok(GeneratedFile::new(format!("{}_csrs_conf.vh", ctx.top()), out))
}

/// `<top>_csrs_def.vh`: macros for use inside an instance, where widths may
/// depend on the instance's parameters.
fn instance_header(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "`include \"{}_csrs_conf.vh\"", ctx.top())?;
    writeln!(out)?;
    writeln!(out, "// {} CSR macros. Widths may depend on instance parameters.", ctx.top())?;
    writeln!(out)?;
    writeln!(out, "`define {prefix}CSRS_ADDR_W {}", ctx.table.core_addr_w)?;
    for reg in ctx.table.registers() {
        let name = reg.register.name.to_uppercase();
        writeln!(out)?;
        writeln!(out, "`define {prefix}{name}_ADDR {}", reg.address)?;
        if reg.layout.log2n_items > 0 {
            writeln!(
                out,
                "`define {prefix}{name}_ADDR_W {}",
                verilog_max(&verilog_addr_w(reg), "1")
            )?;
        }
        writeln!(out, "`define {prefix}{name}_W {}", signal_width(reg))?;
    }
    Ok(GeneratedFile::new(format!("{}_csrs_def.vh", ctx.top()), out))
}

/// `<top>_csrs_lparam.vs`: the same quantities evaluated with default
/// parameter values, for code outside the instance.
fn parameter_header(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "// Address space width")?;
    writeln!(
        out,
        "localparam {}CSRS_ADDR_W = {};",
        prefix, ctx.table.core_addr_w
    )?;
    writeln!(out)?;
    writeln!(out, "// Default register addresses and widths")?;
    for reg in ctx.table.registers() {
        let name = reg.register.name.to_uppercase();
        let layout = RegisterLayout::of(&reg.register, ctx.env, Valuation::Value)?;
        writeln!(out, "localparam {prefix}{name}_ADDR = {};", reg.address)?;
        if layout.log2n_items > 0 {
            writeln!(out, "localparam {prefix}{name}_ADDR_W = {};", layout.addr_w)?;
        }
        writeln!(out, "localparam {prefix}{name}_W = {};", ctx.value_bits(reg)?)?;
        writeln!(out)?;
    }
    Ok(GeneratedFile::new(format!("{}_csrs_lparam.vs", ctx.top()), out))
}

pub(super) fn generate(ctx: &Context) -> Result<Vec<GeneratedFile>> {
    Ok(vec![
        config_header(ctx)?,
        instance_header(ctx)?,
        parameter_header(ctx)?,
    ])
}
