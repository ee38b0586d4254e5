// Licensed under the Apache-2.0 license

//! TeX register tables, one per group, plus a `csrs.tex` that includes them.
//!
//! Addresses are looked up by name in the resolved table, never recomputed.

use std::fmt::Write;

use super::Context;
use crate::error::{CsrError, Result};
use crate::output::GeneratedFile;
use crate::util::tex_escape;

fn index(ctx: &Context) -> Result<GeneratedFile> {
    let mut out = String::new();
    writeln!(
        out,
        "The software accessible registers of the core are described in the following tables. \
         The tables give information on the name, read/write capability, address, width in bits, \
         default value and a textual description."
    )?;
    for group in &ctx.table.groups {
        writeln!(out)?;
        writeln!(out, "\\begin{{table}}[H]")?;
        writeln!(out, "  \\centering")?;
        writeln!(out, "  \\begin{{tabularx}}{{\\textwidth}}{{|l|c|c|c|c|X|}}")?;
        writeln!(out, "    \\hline")?;
        writeln!(out, "    \\rowcolor{{iob-green}}")?;
        writeln!(
            out,
            "    {{\\bf Name}} & {{\\bf R/W}} & {{\\bf Addr}} & {{\\bf Width}} & {{\\bf Default}} & {{\\bf Description}} \\\\ \\hline"
        )?;
        writeln!(out, "    \\input {}_csrs_tab", group.name)?;
        writeln!(out, "  \\end{{tabularx}}")?;
        writeln!(out, "  \\caption{{{}}}", tex_escape(&group.descr))?;
        writeln!(out, "  \\label{{{}_csrs_tab:is}}", group.name)?;
        writeln!(out, "\\end{{table}}")?;
    }
    writeln!(out)?;
    writeln!(out, "\\clearpage")?;
    Ok(GeneratedFile::new("csrs.tex", out))
}

fn group_table(ctx: &Context, group_index: usize) -> Result<GeneratedFile> {
    let group = &ctx.table.groups[group_index];
    let mut out = String::new();
    for reg in &group.regs {
        let r = &reg.register;
        let address = ctx.table.address_of(&r.name).ok_or_else(|| {
            CsrError::address(&r.name, "register missing from the resolved table")
        })?;
        writeln!(
            out,
            "    {} & {} & {} & {} & {} & {} \\\\ \\hline",
            tex_escape(&r.name),
            r.access,
            address,
            tex_escape(r.n_bits.source()),
            r.rst_val,
            tex_escape(&r.descr)
        )?;
    }
    Ok(GeneratedFile::new(format!("{}_csrs_tab.tex", group.name), out))
}

pub(super) fn generate(ctx: &Context) -> Result<Vec<GeneratedFile>> {
    let mut files = vec![index(ctx)?];
    for i in 0..ctx.table.groups.len() {
        files.push(group_table(ctx, i)?);
    }
    Ok(files)
}
