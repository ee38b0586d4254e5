// Licensed under the Apache-2.0 license

//! Software accessors.
//!
//! Three flavours share one register walk:
//! - embedded C, accessing memory-mapped registers from a base address;
//! - host simulation C, routing every access through an `iob_native_t` handle;
//! - Verilog testbench tasks built on `iob_write`/`iob_read`.
//!
//! In every flavour the element address is
//! `REGISTER_ADDR + (index << log2(bytes))`.

use std::fmt::Write;

use super::{is_array, Context};
use crate::alloc::ResolvedRegister;
use crate::error::{CsrError, Result};
use crate::output::GeneratedFile;
use crate::util::ceil_log2;

/// Narrowest C word type holding one register element.
fn c_type(reg: &ResolvedRegister) -> Result<&'static str> {
    match reg.layout.n_bytes {
        1 => Ok("uint8_t"),
        2 => Ok("uint16_t"),
        4 => Ok("uint32_t"),
        8 => Ok("uint64_t"),
        bytes => Err(CsrError::Type {
            register: reg.register.name.clone(),
            bytes,
        }),
    }
}

/// Address expression for one access, `(PREFIX_NAME_ADDR) + (addr << n)`.
fn element_address(macro_name: &str, reg: &ResolvedRegister) -> String {
    if is_array(reg) {
        format!(
            "({macro_name}) + (addr << {})",
            ceil_log2(reg.layout.n_bytes)
        )
    } else {
        format!("({macro_name})")
    }
}

/// The `#define` blocks shared by both C headers.
fn address_macros(ctx: &Context, out: &mut String) -> Result<()> {
    let prefix = ctx.prefix();
    writeln!(out, "// Address space width")?;
    writeln!(out, "#define {prefix}CSRS_ADDR_W {}", ctx.table.core_addr_w)?;
    writeln!(out)?;
    writeln!(out, "// Addresses")?;
    for reg in ctx.table.registers() {
        let name = reg.register.name.to_uppercase();
        writeln!(out, "#define {prefix}{name}_ADDR {}", reg.address)?;
    }
    writeln!(out)?;
    writeln!(out, "// Data widths (bit)")?;
    for reg in ctx.table.registers() {
        let name = reg.register.name.to_uppercase();
        writeln!(out, "#define {prefix}{name}_W {}", 8 * reg.layout.n_bytes)?;
    }
    writeln!(out)?;
    Ok(())
}

/// C prototypes without the trailing `;` or body.
///
/// `handle` is appended as the last argument of each function.
fn prototypes(ctx: &Context, reg: &ResolvedRegister, handle: &str) -> Result<Vec<String>> {
    let prefix = ctx.prefix();
    let name = reg.register.name.to_uppercase();
    let ty = c_type(reg)?;
    let mut out = Vec::new();
    if reg.register.access.is_write() {
        let index = if is_array(reg) { ", int addr" } else { "" };
        let handle = if handle.is_empty() {
            String::new()
        } else {
            format!(", {handle}")
        };
        out.push(format!("void {prefix}SET_{name}({ty} value{index}{handle})"));
    }
    if reg.register.access.is_read() {
        let mut args = Vec::new();
        if is_array(reg) {
            args.push("int addr");
        }
        if !handle.is_empty() {
            args.push(handle);
        }
        out.push(format!("{ty} {prefix}GET_{name}({})", args.join(", ")));
    }
    Ok(out)
}

fn c_header(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "#ifndef H_{prefix}CSRS_H")?;
    writeln!(out, "#define H_{prefix}CSRS_H")?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;
    address_macros(ctx, &mut out)?;
    writeln!(out, "// Base address")?;
    writeln!(out, "void {prefix}INIT_BASEADDR(uint32_t addr);")?;
    writeln!(out)?;
    writeln!(out, "// Setters and getters")?;
    for reg in ctx.table.registers() {
        for proto in prototypes(ctx, reg, "")? {
            writeln!(out, "{proto};")?;
        }
    }
    writeln!(out)?;
    writeln!(out, "#endif // H_{prefix}CSRS_H")?;
    Ok(GeneratedFile::new(format!("{}_csrs.h", ctx.top()), out))
}

fn c_source(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "#include \"{}_csrs.h\"", ctx.top())?;
    writeln!(out)?;
    writeln!(out, "static uint32_t base;")?;
    writeln!(out, "void {prefix}INIT_BASEADDR(uint32_t addr) {{")?;
    writeln!(out, "  base = addr;")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    for reg in ctx.table.registers() {
        let ty = c_type(reg)?;
        let macro_name = format!("{prefix}{}_ADDR", reg.register.name.to_uppercase());
        let address = element_address(&macro_name, reg);
        let mut protos = prototypes(ctx, reg, "")?.into_iter();
        if reg.register.access.is_write() {
            if let Some(proto) = protos.next() {
                writeln!(out, "{proto} {{")?;
                writeln!(out, "  (*((volatile {ty} *)((base) + {address})) = (value));")?;
                writeln!(out, "}}")?;
                writeln!(out)?;
            }
        }
        if reg.register.access.is_read() {
            if let Some(proto) = protos.next() {
                writeln!(out, "{proto} {{")?;
                writeln!(out, "  return (*((volatile {ty} *)((base) + {address})));")?;
                writeln!(out, "}}")?;
                writeln!(out)?;
            }
        }
    }
    Ok(GeneratedFile::new(format!("{}_csrs_emb.c", ctx.top()), out))
}

const NATIVE_HANDLE: &str = "iob_native_t *native_if";

fn verilator_header(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "#ifndef H_{prefix}CSRS_VERILATOR_H")?;
    writeln!(out, "#define H_{prefix}CSRS_VERILATOR_H")?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;
    writeln!(out, "#include \"iob_tasks.h\"")?;
    writeln!(out)?;
    address_macros(ctx, &mut out)?;
    writeln!(out, "// Setters and getters")?;
    for reg in ctx.table.registers() {
        for proto in prototypes(ctx, reg, NATIVE_HANDLE)? {
            writeln!(out, "{proto};")?;
        }
    }
    writeln!(out)?;
    writeln!(out, "#endif // H_{prefix}CSRS_VERILATOR_H")?;
    Ok(GeneratedFile::new(format!("{}_csrs_verilator.h", ctx.top()), out))
}

fn verilator_source(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "#include \"{}_csrs_verilator.h\"", ctx.top())?;
    writeln!(out)?;
    for reg in ctx.table.registers() {
        let ty = c_type(reg)?;
        let upper = reg.register.name.to_uppercase();
        let address = element_address(&format!("{prefix}{upper}_ADDR"), reg);
        let mut protos = prototypes(ctx, reg, NATIVE_HANDLE)?.into_iter();
        if reg.register.access.is_write() {
            if let Some(proto) = protos.next() {
                writeln!(out, "{proto} {{")?;
                writeln!(
                    out,
                    "  iob_write({address}, value, {prefix}{upper}_W, native_if);"
                )?;
                writeln!(out, "}}")?;
                writeln!(out)?;
            }
        }
        if reg.register.access.is_read() {
            if let Some(proto) = protos.next() {
                writeln!(out, "{proto} {{")?;
                writeln!(out, "  return ({ty})iob_read({address}, native_if);")?;
                writeln!(out, "}}")?;
                writeln!(out)?;
            }
        }
    }
    Ok(GeneratedFile::new(
        format!("{}_csrs_emb_verilator.c", ctx.top()),
        out,
    ))
}

/// `<top>_csrs_emb_tb.vs`: testbench tasks using the instance header macros.
fn testbench_tasks(ctx: &Context) -> Result<GeneratedFile> {
    let prefix = ctx.prefix();
    let mut out = String::new();
    writeln!(out, "// {} CSR setters and getters", ctx.top())?;
    writeln!(out)?;
    for reg in ctx.table.registers() {
        let upper = reg.register.name.to_uppercase();
        let ty = format!("[{}-1:0]", 8 * reg.layout.n_bytes);
        let address = element_address(&format!("`{prefix}{upper}_ADDR"), reg);
        if reg.register.access.is_write() {
            let index = if is_array(reg) {
                ", input reg [ADDR_W-1:0] addr"
            } else {
                ""
            };
            writeln!(
                out,
                "task static {prefix}SET_{upper}(input reg {ty} value{index});"
            )?;
            writeln!(out, "  iob_write({address}, value, `{prefix}{upper}_W);")?;
            writeln!(out, "endtask")?;
            writeln!(out)?;
        }
        if reg.register.access.is_read() {
            let index = if is_array(reg) {
                "input reg [ADDR_W-1:0] addr, "
            } else {
                ""
            };
            writeln!(
                out,
                "task static {prefix}GET_{upper}({index}output reg {ty} rvalue);"
            )?;
            writeln!(out, "  iob_read({address}, rvalue, `{prefix}{upper}_W);")?;
            writeln!(out, "endtask")?;
            writeln!(out)?;
        }
    }
    Ok(GeneratedFile::new(format!("{}_csrs_emb_tb.vs", ctx.top()), out))
}

pub(super) fn generate(ctx: &Context) -> Result<Vec<GeneratedFile>> {
    Ok(vec![
        c_header(ctx)?,
        c_source(ctx)?,
        verilator_header(ctx)?,
        verilator_source(ctx)?,
        testbench_tasks(ctx)?,
    ])
}
