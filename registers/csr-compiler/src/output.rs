// Licensed under the Apache-2.0 license

//! Output types of the CSR compiler.
//!
//! The hardware generator produces a structured [`HardwareFragment`] (ports,
//! internal signals, sub-instances and a behavioral code snippet) that the
//! module-composition tooling can merge into a larger design, and that can
//! also be rendered on its own into a Verilog module. Every other artifact is
//! plain text carried in a [`GeneratedFile`].
//!
//! ## Rendered Module Structure
//!
//! ```text
//! module iob_timer_csrs #(
//!     parameter ADDR_W = 4,
//!     parameter DATA_W = 32
//! ) (
//!     // clk_en_rst: Clock, clock enable and asynchronous reset
//!     input clk_i,
//!     ...
//!     output enable_o
//! );
//!     wire internal_iob_valid;       <- Wire[]
//!     ...
//!     iob_reg #(...) state_reg (...); <- Instance[]
//!     ...                            <- snippet
//! endmodule
//! ```

use std::fmt::Write;

use crate::alloc::ResolvedTable;
use crate::error::Result;

//=============================================================================
// Hardware Types
//=============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn keyword(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }

    /// Suffix appended to a signal name to form its port name.
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Input => "_i",
            Direction::Output => "_o",
        }
    }
}

/// One signal of a port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signal {
    /// Name without the direction suffix.
    pub name: String,
    pub direction: Direction,
    /// Width as a Verilog expression, e.g. `1` or `DATA_W/8`.
    pub width: String,
}

impl Signal {
    pub fn input(name: impl Into<String>, width: impl ToString) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Input,
            width: width.to_string(),
        }
    }

    pub fn output(name: impl Into<String>, width: impl ToString) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Output,
            width: width.to_string(),
        }
    }

    /// Name of the module port carrying this signal.
    pub fn port_name(&self) -> String {
        format!("{}{}", self.name, self.direction.suffix())
    }
}

/// A named group of signals on the module boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Port {
    pub name: String,
    pub descr: String,
    pub signals: Vec<Signal>,
}

/// An internal signal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Wire {
    pub name: String,
    pub width: String,
    /// Assigned inside an `always` block, so declared as `reg`.
    pub is_var: bool,
}

impl Wire {
    pub fn net(name: impl Into<String>, width: impl ToString) -> Self {
        Self {
            name: name.into(),
            width: width.to_string(),
            is_var: false,
        }
    }

    pub fn var(name: impl Into<String>, width: impl ToString) -> Self {
        Self {
            name: name.into(),
            width: width.to_string(),
            is_var: true,
        }
    }
}

/// A sub-module instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instance {
    pub core_name: String,
    pub instance_name: String,
    pub descr: String,
    /// Parameter overrides, in order.
    pub parameters: Vec<(String, String)>,
    /// Port connections as `(instance port, connected signal)`.
    pub connections: Vec<(String, String)>,
}

impl Instance {
    pub fn new(core_name: &str, instance_name: &str, descr: &str) -> Self {
        Self {
            core_name: core_name.to_string(),
            instance_name: instance_name.to_string(),
            descr: descr.to_string(),
            parameters: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.parameters.push((name.to_string(), value.to_string()));
        self
    }

    pub fn connect(mut self, port: &str, signal: impl Into<String>) -> Self {
        self.connections.push((port.to_string(), signal.into()));
        self
    }

    /// Connects the standard clock, clock-enable and reset inputs.
    pub fn clk_en_rst(self) -> Self {
        self.connect("clk_i", "clk_i")
            .connect("cke_i", "cke_i")
            .connect("arst_i", "arst_i")
    }
}

/// Everything the register file contributes to its owning module.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HardwareFragment {
    /// Module parameters with their default values.
    pub parameters: Vec<(String, String)>,
    pub ports: Vec<Port>,
    pub wires: Vec<Wire>,
    pub instances: Vec<Instance>,
    /// Behavioral Verilog: continuous assignments and the response/FSM block.
    pub snippet: String,
}

//=============================================================================
// Text Artifacts
//=============================================================================

/// One generated text file; writing it anywhere is the caller's job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(name: impl Into<String>, contents: String) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }
}

/// The complete result of one compiler run.
#[derive(Clone, Debug)]
pub struct CsrArtifacts {
    /// The resolved address table every artifact was generated from.
    pub table: ResolvedTable,
    pub hardware: HardwareFragment,
    pub files: Vec<GeneratedFile>,
}

impl CsrArtifacts {
    /// Looks up a generated file by name.
    pub fn file(&self, name: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

//=============================================================================
// Verilog Rendering
//=============================================================================

fn range(width: &str) -> String {
    if width.trim() == "1" {
        String::new()
    } else {
        format!("[{width}-1:0] ")
    }
}

impl HardwareFragment {
    /// Renders the fragment as a standalone Verilog module named `module_name`.
    pub fn render(&self, module_name: &str) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "`timescale 1ns / 1ps")?;
        writeln!(out)?;
        if self.parameters.is_empty() {
            writeln!(out, "module {module_name} (")?;
        } else {
            writeln!(out, "module {module_name} #(")?;
            let count = self.parameters.len();
            for (i, (name, value)) in self.parameters.iter().enumerate() {
                let comma = if i + 1 < count { "," } else { "" };
                writeln!(out, "    parameter {name} = {value}{comma}")?;
            }
            writeln!(out, ") (")?;
        }

        let count: usize = self.ports.iter().map(|p| p.signals.len()).sum();
        let mut emitted = 0;
        for port in &self.ports {
            writeln!(out, "    // {}: {}", port.name, port.descr)?;
            for signal in &port.signals {
                emitted += 1;
                let comma = if emitted < count { "," } else { "" };
                writeln!(
                    out,
                    "    {} {}{}{comma}",
                    signal.direction.keyword(),
                    range(&signal.width),
                    signal.port_name()
                )?;
            }
        }
        writeln!(out, ");")?;
        writeln!(out)?;

        for wire in &self.wires {
            let kind = if wire.is_var { "reg" } else { "wire" };
            writeln!(out, "    {kind} {}{};", range(&wire.width), wire.name)?;
        }

        for instance in &self.instances {
            writeln!(out)?;
            writeln!(out, "    // {}", instance.descr)?;
            if instance.parameters.is_empty() {
                writeln!(out, "    {} {} (", instance.core_name, instance.instance_name)?;
            } else {
                writeln!(out, "    {} #(", instance.core_name)?;
                let count = instance.parameters.len();
                for (i, (name, value)) in instance.parameters.iter().enumerate() {
                    let comma = if i + 1 < count { "," } else { "" };
                    writeln!(out, "        .{name}({value}){comma}")?;
                }
                writeln!(out, "    ) {} (", instance.instance_name)?;
            }
            let count = instance.connections.len();
            for (i, (port, signal)) in instance.connections.iter().enumerate() {
                let comma = if i + 1 < count { "," } else { "" };
                writeln!(out, "        .{port}({signal}){comma}")?;
            }
            writeln!(out, "    );")?;
        }

        writeln!(out)?;
        out.push_str(&self.snippet);
        writeln!(out)?;
        writeln!(out, "endmodule")?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_module() {
        let fragment = HardwareFragment {
            parameters: vec![("DATA_W".into(), "32".into())],
            ports: vec![
                Port {
                    name: "clk_en_rst".into(),
                    descr: "Clock".into(),
                    signals: vec![Signal::input("clk", 1)],
                },
                Port {
                    name: "data".into(),
                    descr: "data register interface".into(),
                    signals: vec![Signal::output("data", "DATA_W")],
                },
            ],
            wires: vec![Wire::net("state", 1), Wire::var("rdata_nxt", 32)],
            instances: vec![Instance::new("iob_reg", "state_reg", "state register")
                .param("DATA_W", 1)
                .connect("data_i", "state_nxt")],
            snippet: "    assign data_o = 0;\n".into(),
        };
        let text = fragment.render("m_csrs").unwrap();
        assert!(text.contains("module m_csrs #(\n    parameter DATA_W = 32\n) ("));
        assert!(text.contains("    input clk_i,\n"));
        assert!(text.contains("    output [DATA_W-1:0] data_o\n);"));
        assert!(text.contains("    wire state;\n"));
        assert!(text.contains("    reg [32-1:0] rdata_nxt;\n"));
        assert!(text.contains("    iob_reg #(\n        .DATA_W(1)\n    ) state_reg (\n        .data_i(state_nxt)\n    );"));
        assert!(text.trim_end().ends_with("endmodule"));
    }
}
