// Licensed under the Apache-2.0 license

//! Writes (or checks) the artifacts of one CSR module description.

use anyhow::{bail, Context, Result};
use csr_compiler::{generate_csrs, CsrArtifacts, CsrModule, GeneratedFile};
use log::{debug, info};
use std::path::{Path, PathBuf};

fn compile(input: &Path) -> Result<(CsrModule, CsrArtifacts)> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let run = || -> csr_compiler::Result<_> {
        let module = CsrModule::from_toml_str(&text)?;
        let artifacts = generate_csrs(&module)?;
        Ok((module, artifacts))
    };
    run().with_context(|| format!("failed to compile {}", input.display()))
}

/// Files under `out` whose contents differ from `files`, or that are missing.
fn stale_files<'a>(out: &Path, files: &'a [GeneratedFile]) -> Vec<&'a str> {
    files
        .iter()
        .filter(|f| match std::fs::read_to_string(out.join(&f.name)) {
            Ok(existing) => existing != f.contents,
            Err(_) => true,
        })
        .map(|f| f.name.as_str())
        .collect()
}

/// Generates every artifact of `input` into `out`.
///
/// With `check`, nothing is written and the call fails if any file in `out`
/// is missing or out of date.
pub fn generate(input: &Path, out: Option<&Path>, check: bool) -> Result<()> {
    let (module, artifacts) = compile(input)?;
    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("build").join(&module.name));

    if check {
        let stale = stale_files(&out, &artifacts.files);
        if !stale.is_empty() {
            bail!(
                "{} is out of date ({}); run `cargo xtask csr-gen {}`",
                out.display(),
                stale.join(", "),
                input.display()
            );
        }
        info!("{} is up to date", out.display());
        return Ok(());
    }

    std::fs::create_dir_all(&out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    for file in &artifacts.files {
        let path = out.join(&file.name);
        std::fs::write(&path, &file.contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("wrote {}", path.display());
    }
    info!(
        "Wrote {} files for {} registers to {}",
        artifacts.files.len(),
        artifacts.table.registers().count(),
        out.display()
    );
    Ok(())
}

/// Prints the resolved address map.
pub fn print_map(input: &Path) -> Result<()> {
    let (_, artifacts) = compile(input)?;
    let table = &artifacts.table;
    println!("address width: {} bits", table.core_addr_w);
    for group in &table.groups {
        println!("{}: {}", group.name, group.descr);
        for reg in &group.regs {
            println!(
                "  0x{:04x} {:<3} {:<20} {} bytes x {}",
                reg.address,
                reg.register.access.to_string(),
                reg.register.name,
                reg.layout.n_bytes,
                reg.layout.n_items()
            );
        }
    }
    Ok(())
}
