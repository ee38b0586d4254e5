// Licensed under the Apache-2.0 license

//! Register file hardware.
//!
//! The register file sits behind an internal request/response bus
//! (`internal_iob_*`). Write registers decode the byte address of the first
//! strobed byte (`waddr`); read registers decode the word address and OR
//! their data into their byte lanes of the response word. A two-state
//! machine sequences each request:
//!
//! ```text
//!            valid & !ready / ready = wstrb ? wready : rready
//!   ┌──────────┐  accepted read  ┌─────────────┐
//!   │ WAIT_REQ ├────────────────►│ WAIT_RVALID │
//!   │          │◄────────────────┤             │
//!   └──────────┘  rvalid / rvalid└─────────────┘
//! ```

use std::fmt::Write;

use super::{signal_width, Context};
use crate::alloc::ResolvedRegister;
use crate::config::CsrInterface;
use crate::error::{CsrError, Result};
use crate::output::Direction::{self, Input, Output};
use crate::output::{HardwareFragment, Instance, Port, Signal, Wire};
use crate::types::Access;
use crate::util::{bfloor, boffset, ceil_log2};

/// Signal name without the protocol prefix, direction and width.
type SignalSpec = (&'static str, Direction, &'static str);

/// Internal bus signals, as seen by the register file.
const IOB_SIGNALS: &[(&str, &str)] = &[
    ("valid", "1"),
    ("addr", "ADDR_W"),
    ("wdata", "DATA_W"),
    ("wstrb", "DATA_W/8"),
    ("rvalid", "1"),
    ("rdata", "DATA_W"),
    ("ready", "1"),
];

const NATIVE_SIGNALS: &[SignalSpec] = &[
    ("valid", Input, "1"),
    ("addr", Input, "ADDR_W"),
    ("wdata", Input, "DATA_W"),
    ("wstrb", Input, "DATA_W/8"),
    ("rvalid", Output, "1"),
    ("rdata", Output, "DATA_W"),
    ("ready", Output, "1"),
];

const APB_SIGNALS: &[SignalSpec] = &[
    ("addr", Input, "ADDR_W"),
    ("sel", Input, "1"),
    ("enable", Input, "1"),
    ("write", Input, "1"),
    ("wdata", Input, "DATA_W"),
    ("wstrb", Input, "DATA_W/8"),
    ("rdata", Output, "DATA_W"),
    ("ready", Output, "1"),
];

const AXIL_SIGNALS: &[SignalSpec] = &[
    ("awaddr", Input, "ADDR_W"),
    ("awprot", Input, "3"),
    ("awvalid", Input, "1"),
    ("awready", Output, "1"),
    ("wdata", Input, "DATA_W"),
    ("wstrb", Input, "DATA_W/8"),
    ("wvalid", Input, "1"),
    ("wready", Output, "1"),
    ("bresp", Output, "2"),
    ("bvalid", Output, "1"),
    ("bready", Input, "1"),
    ("araddr", Input, "ADDR_W"),
    ("arprot", Input, "3"),
    ("arvalid", Input, "1"),
    ("arready", Output, "1"),
    ("rdata", Output, "DATA_W"),
    ("rresp", Output, "2"),
    ("rvalid", Output, "1"),
    ("rready", Input, "1"),
];

const AXI_SIGNALS: &[SignalSpec] = &[
    ("awid", Input, "1"),
    ("awaddr", Input, "ADDR_W"),
    ("awlen", Input, "8"),
    ("awsize", Input, "3"),
    ("awburst", Input, "2"),
    ("awlock", Input, "2"),
    ("awcache", Input, "4"),
    ("awprot", Input, "3"),
    ("awqos", Input, "4"),
    ("awvalid", Input, "1"),
    ("awready", Output, "1"),
    ("wdata", Input, "DATA_W"),
    ("wstrb", Input, "DATA_W/8"),
    ("wlast", Input, "1"),
    ("wvalid", Input, "1"),
    ("wready", Output, "1"),
    ("bid", Output, "1"),
    ("bresp", Output, "2"),
    ("bvalid", Output, "1"),
    ("bready", Input, "1"),
    ("arid", Input, "1"),
    ("araddr", Input, "ADDR_W"),
    ("arlen", Input, "8"),
    ("arsize", Input, "3"),
    ("arburst", Input, "2"),
    ("arlock", Input, "2"),
    ("arcache", Input, "4"),
    ("arprot", Input, "3"),
    ("arqos", Input, "4"),
    ("arvalid", Input, "1"),
    ("arready", Output, "1"),
    ("rid", Output, "1"),
    ("rdata", Output, "DATA_W"),
    ("rresp", Output, "2"),
    ("rlast", Output, "1"),
    ("rvalid", Output, "1"),
    ("rready", Input, "1"),
];

/// Signals of the external control port for `csr_if`.
pub(super) fn control_signals(csr_if: CsrInterface) -> Vec<Signal> {
    let specs = match csr_if {
        CsrInterface::Native => NATIVE_SIGNALS,
        CsrInterface::Apb => APB_SIGNALS,
        CsrInterface::Axil => AXIL_SIGNALS,
        CsrInterface::Axi => AXI_SIGNALS,
    };
    specs
        .iter()
        .map(|(name, direction, width)| Signal {
            name: format!("{}_{name}", csr_if.prefix()),
            direction: *direction,
            width: width.to_string(),
        })
        .collect()
}

/// Parameter names the converter core uses for the bus widths.
fn converter_params(csr_if: CsrInterface) -> (&'static str, &'static str) {
    match csr_if {
        CsrInterface::Apb => ("APB_ADDR_W", "APB_DATA_W"),
        CsrInterface::Axi => ("ADDR_WIDTH", "DATA_WIDTH"),
        CsrInterface::Native | CsrInterface::Axil => ("ADDR_W", "DATA_W"),
    }
}

/// One independently addressed piece of a register.
struct Element {
    name: String,
    address: u64,
    /// Bytes the address decode covers.
    len: u64,
}

/// Scalar registers and manual registers are decoded as one block; auto
/// arrays get one element per item.
fn elements(reg: &ResolvedRegister) -> Vec<Element> {
    let name = &reg.register.name;
    let n_items = reg.layout.n_items();
    if reg.register.auto && n_items > 1 {
        (0..n_items)
            .map(|i| Element {
                name: format!("{name}_{i}"),
                address: reg.address + i * reg.layout.n_bytes,
                len: reg.layout.n_bytes,
            })
            .collect()
    } else {
        vec![Element {
            name: name.clone(),
            address: reg.address,
            len: reg.layout.span(),
        }]
    }
}

/// Reset value literal sized to `width`.
fn reset_literal(width: &str, rst_val: u64) -> String {
    match width.parse::<u64>() {
        Ok(bits) => format!("{bits}'d{rst_val}"),
        Err(_) if rst_val == 0 => format!("{{{width}{{1'd0}}}}"),
        Err(_) => {
            let rst_bits = 64 - rst_val.leading_zeros();
            format!("{{{{({width}-{rst_bits}){{1'd0}}}},{rst_bits}'d{rst_val}}}")
        }
    }
}

fn register_port(reg: &ResolvedRegister) -> Option<Port> {
    let r = &reg.register;
    if r.is_version() {
        return None;
    }
    let width = signal_width(reg);
    let name = &r.name;
    let mut signals = Vec::new();
    if r.access.is_write() {
        if r.auto {
            for e in elements(reg) {
                signals.push(Signal::output(e.name, &width));
            }
        } else {
            signals.push(Signal::output(format!("{name}_wdata"), &width));
            signals.push(Signal::output(format!("{name}_wen"), 1));
            signals.push(Signal::input(format!("{name}_wready"), 1));
        }
    }
    if r.access.is_read() {
        if r.auto {
            // An auto read-write register reads back its own storage.
            if r.access == Access::Read {
                for e in elements(reg) {
                    signals.push(Signal::input(e.name, &width));
                }
            }
        } else {
            signals.push(Signal::input(format!("{name}_rdata"), &width));
            signals.push(Signal::input(format!("{name}_rvalid"), 1));
            signals.push(Signal::output(format!("{name}_ren"), 1));
            signals.push(Signal::input(format!("{name}_rready"), 1));
        }
    }
    Some(Port {
        name: name.clone(),
        descr: format!("{name} register interface"),
        signals,
    })
}

struct Builder<'a> {
    ctx: &'a Context<'a>,
    fragment: HardwareFragment,
    /// Continuous assignments and per-register logic.
    logic: String,
    /// Body of the response `always` block.
    response: String,
}

impl<'a> Builder<'a> {
    fn new(ctx: &'a Context<'a>) -> Self {
        Self {
            ctx,
            fragment: HardwareFragment::default(),
            logic: String::new(),
            response: String::new(),
        }
    }

    fn bus_bytes(&self) -> u64 {
        self.ctx.bus_bytes()
    }

    fn interface(&mut self) -> Result<()> {
        let config = &self.ctx.module.config;
        self.fragment.parameters = vec![
            ("ADDR_W".into(), self.ctx.table.core_addr_w.to_string()),
            ("DATA_W".into(), config.data_w.to_string()),
        ];
        self.fragment.ports.push(Port {
            name: "clk_en_rst".into(),
            descr: "Clock, clock enable and asynchronous reset".into(),
            signals: vec![
                Signal::input("clk", 1),
                Signal::input("cke", 1),
                Signal::input("arst", 1),
            ],
        });
        let control = control_signals(config.csr_if);
        self.fragment.ports.push(Port {
            name: "control_if".into(),
            descr: format!("CSR control interface ({})", config.csr_if),
            signals: control.clone(),
        });
        self.fragment.ports.push(Port {
            name: "csrs_iob_output".into(),
            descr: "Internal CSR bus, for user logic".into(),
            signals: IOB_SIGNALS
                .iter()
                .map(|(name, width)| Signal::output(format!("csrs_iob_{name}"), width))
                .collect(),
        });

        for (name, width) in IOB_SIGNALS {
            self.fragment
                .wires
                .push(Wire::net(format!("internal_iob_{name}"), width));
        }

        writeln!(self.logic, "    localparam WSTRB_W = DATA_W/8;")?;
        writeln!(self.logic, "    localparam NBYTES_W = $clog2(WSTRB_W);")?;
        writeln!(self.logic, "    localparam WAIT_REQ = 1'd0;")?;
        writeln!(self.logic, "    localparam WAIT_RVALID = 1'd1;")?;
        writeln!(self.logic)?;
        for (name, _) in IOB_SIGNALS {
            writeln!(self.logic, "    assign csrs_iob_{name}_o = internal_iob_{name};")?;
        }
        writeln!(self.logic)?;

        match config.csr_if.converter() {
            None => {
                for (name, _) in &IOB_SIGNALS[..4] {
                    writeln!(self.logic, "    assign internal_iob_{name} = iob_{name}_i;")?;
                }
                for (name, _) in &IOB_SIGNALS[4..] {
                    writeln!(self.logic, "    assign iob_{name}_o = internal_iob_{name};")?;
                }
            }
            Some(converter) => {
                let (addr_param, data_param) = converter_params(config.csr_if);
                let mut instance = Instance::new(
                    converter,
                    &format!("{converter}_converter"),
                    &format!(
                        "Convert the {} control port into the internal bus",
                        config.csr_if
                    ),
                )
                .param(addr_param, "ADDR_W")
                .param(data_param, "DATA_W")
                .clk_en_rst();
                for signal in &control {
                    instance = instance.connect(&signal.port_name(), signal.port_name());
                }
                for (i, (name, _)) in IOB_SIGNALS.iter().enumerate() {
                    let suffix = if i < 4 { "_o" } else { "_i" };
                    instance = instance
                        .connect(&format!("iob_{name}{suffix}"), format!("internal_iob_{name}"));
                }
                self.fragment.instances.push(instance);
            }
        }
        Ok(())
    }

    /// Word and write-byte addresses shared by every decoder.
    fn addresses(&mut self) -> Result<()> {
        self.fragment
            .wires
            .push(Wire::net("byte_offset", "$clog2(DATA_W/8)+1"));
        self.fragment.wires.push(Wire::net("word_addr", "ADDR_W"));
        self.fragment.wires.push(Wire::net("waddr", "ADDR_W"));
        self.fragment.instances.push(
            Instance::new("iob_ctls", "bo_inst", "Offset of the first strobed byte")
                .param("W", "DATA_W/8")
                .param("MODE", 0)
                .param("SYMBOL", 0)
                .connect("data_i", "internal_iob_wstrb")
                .connect("count_o", "byte_offset"),
        );
        writeln!(
            self.logic,
            "    assign word_addr = (internal_iob_addr >> NBYTES_W) << NBYTES_W;"
        )?;
        writeln!(self.logic, "    assign waddr = word_addr + byte_offset;")?;
        Ok(())
    }

    fn register_header(&mut self, reg: &ResolvedRegister) -> Result<()> {
        let r = &reg.register;
        writeln!(self.logic)?;
        writeln!(
            self.logic,
            "    // {}: {}, {} bits, reset {}, address {}, span {} bytes (max), {}",
            r.name,
            r.access,
            r.n_bits,
            r.rst_val,
            reg.address,
            reg.layout.span(),
            if r.auto { "auto" } else { "manual" }
        )?;
        Ok(())
    }

    fn write_register(&mut self, reg: &ResolvedRegister) -> Result<()> {
        let r = &reg.register;
        if reg.layout.n_bytes > self.bus_bytes() {
            return Err(CsrError::config(format!(
                "write register `{}` is {} bytes wide, wider than the {}-byte bus",
                r.name,
                reg.layout.n_bytes,
                self.bus_bytes()
            )));
        }
        if r.auto && r.rst_val != 0 {
            let bits = self.ctx.value_bits(reg)?;
            let fits = u32::try_from(bits)
                .is_ok_and(|bits| r.rst_val.checked_shr(bits).map_or(true, |rest| rest == 0));
            if !fits {
                return Err(CsrError::config(format!(
                    "register `{}` reset value {} does not fit in {bits} bits",
                    r.name, r.rst_val
                )));
            }
        }
        let width = signal_width(reg);
        for e in elements(reg) {
            let n = &e.name;
            self.fragment
                .wires
                .push(Wire::net(format!("{n}_wdata"), &width));
            self.fragment
                .wires
                .push(Wire::net(format!("{n}_addressed_w"), 1));
            writeln!(
                self.logic,
                "    assign {n}_wdata = internal_iob_wdata[{}+:{width}];",
                boffset(e.address, self.bus_bytes())
            )?;
            writeln!(
                self.logic,
                "    assign {n}_addressed_w = (waddr >= {}) && (waddr < {});",
                e.address,
                e.address + e.len
            )?;
            if r.auto {
                self.fragment.wires.push(Wire::net(format!("{n}_wen"), 1));
                writeln!(
                    self.logic,
                    "    assign {n}_wen = (internal_iob_valid & internal_iob_ready) & ((|internal_iob_wstrb) & {n}_addressed_w);"
                )?;
                self.fragment.instances.push(
                    Instance::new("iob_reg_e", &format!("{n}_datareg"), &format!("{n} storage"))
                        .param("DATA_W", &width)
                        .param("RST_VAL", reset_literal(&width, r.rst_val))
                        .clk_en_rst()
                        .connect("en_i", format!("{n}_wen"))
                        .connect("data_i", format!("{n}_wdata"))
                        .connect("data_o", format!("{n}_o")),
                );
            } else {
                writeln!(
                    self.logic,
                    "    assign {n}_wen_o = ({n}_addressed_w & (internal_iob_valid & internal_iob_ready)) ? |internal_iob_wstrb : 1'b0;"
                )?;
                writeln!(self.logic, "    assign {n}_wdata_o = {n}_wdata;")?;
                writeln!(self.response, "        if ({n}_addressed_w) begin")?;
                writeln!(self.response, "            wready_int = {n}_wready_i;")?;
                writeln!(self.response, "        end")?;
            }
        }
        Ok(())
    }

    fn read_register(&mut self, reg: &ResolvedRegister) -> Result<()> {
        let r = &reg.register;
        let name = &r.name;
        let bus = self.bus_bytes();
        let bus_bits = 8 * bus;
        let elem_bytes = reg.layout.n_bytes;
        let handshake = !r.auto && !r.is_version();

        if handshake {
            self.fragment
                .wires
                .push(Wire::net(format!("{name}_addressed_r"), 1));
            writeln!(
                self.logic,
                "    assign {name}_addressed_r = (internal_iob_addr >= {}) && (internal_iob_addr < {});",
                reg.address,
                reg.end()
            )?;
            writeln!(
                self.logic,
                "    assign {name}_ren_o = {name}_addressed_r & (internal_iob_valid & internal_iob_ready) & (~|internal_iob_wstrb);"
            )?;
        }

        for e in elements(reg) {
            let source = if r.is_version() {
                format!("16'h{:04x}", r.rst_val)
            } else if !r.auto {
                format!("{name}_rdata_i")
            } else if r.access.is_write() {
                format!("{}_o", e.name)
            } else {
                format!("{}_i", e.name)
            };
            // A block that holds several items of a manual array.
            let shared_block = e.len > elem_bytes;
            let block_start = bfloor(e.address, ceil_log2(bus));
            let in_block = format!(
                "(word_addr >= {block_start}) && (word_addr < {})",
                e.address + e.len
            );

            if elem_bytes <= bus {
                let (decode, lane) = if shared_block {
                    (in_block, format!("8*(internal_iob_addr % {bus})"))
                } else {
                    (
                        format!("word_addr == {block_start}"),
                        boffset(e.address, bus).to_string(),
                    )
                };
                self.read_slot(
                    &format!("{}_rsel", e.name),
                    &decode,
                    &lane,
                    8 * elem_bytes,
                    &source,
                    handshake.then_some(name.as_str()),
                )?;
            } else {
                let words = elem_bytes.div_ceil(bus);
                let ext = format!("{}_rdata_ext", e.name);
                self.fragment
                    .wires
                    .push(Wire::net(&ext, words * bus_bits));
                writeln!(self.logic, "    assign {ext} = {source};")?;
                for k in 0..words {
                    let decode = if shared_block {
                        format!(
                            "{in_block} && (((word_addr - {}) % {elem_bytes}) == {})",
                            e.address,
                            k * bus
                        )
                    } else {
                        format!("word_addr == {}", e.address + k * bus)
                    };
                    self.read_slot(
                        &format!("{}_w{k}_rsel", e.name),
                        &decode,
                        "0",
                        bus_bits,
                        &format!("{ext}[{}+:{bus_bits}]", k * bus_bits),
                        handshake.then_some(name.as_str()),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn read_slot(
        &mut self,
        select: &str,
        decode: &str,
        lane: &str,
        bits: u64,
        source: &str,
        handshake: Option<&str>,
    ) -> Result<()> {
        self.fragment.wires.push(Wire::var(select, 1));
        let slice = format!("rdata_nxt[{lane}+:{bits}]");
        writeln!(self.response, "        {select} = {decode};")?;
        writeln!(self.response, "        if ({select}) begin")?;
        writeln!(self.response, "            {slice} = {slice} | {source};")?;
        if let Some(name) = handshake {
            writeln!(self.response, "            rvalid_int = {name}_rvalid_i;")?;
            writeln!(self.response, "            rready_int = {name}_rready_i;")?;
        }
        writeln!(self.response, "        end")?;
        Ok(())
    }

    /// Response registers and the request state machine.
    fn protocol(&mut self) -> Result<()> {
        for (name, width) in [
            ("state", "1"),
            ("rvalid", "1"),
            ("rdata", "DATA_W"),
            ("ready", "1"),
        ] {
            self.fragment.wires.push(Wire::net(name, width));
            self.fragment
                .wires
                .push(Wire::var(format!("{name}_nxt"), width));
            self.fragment.instances.push(
                Instance::new("iob_reg", &format!("{name}_reg"), &format!("{name} register"))
                    .param("DATA_W", width)
                    .param("RST_VAL", if width == "1" { "1'b0" } else { "{DATA_W{1'b0}}" })
                    .clk_en_rst()
                    .connect("data_i", format!("{name}_nxt"))
                    .connect("data_o", name),
            );
        }
        for name in ["rvalid_int", "wready_int", "rready_int"] {
            self.fragment.wires.push(Wire::var(name, 1));
        }

        let s = &mut self.fragment.snippet;
        s.push_str(&self.logic);
        writeln!(s)?;
        writeln!(s, "    assign internal_iob_rvalid = rvalid;")?;
        writeln!(s, "    assign internal_iob_rdata = rdata;")?;
        writeln!(s, "    assign internal_iob_ready = ready;")?;
        writeln!(s)?;
        writeln!(s, "    always @* begin")?;
        writeln!(s, "        rdata_nxt = {{DATA_W{{1'b0}}}};")?;
        writeln!(
            s,
            "        rvalid_int = (internal_iob_valid & internal_iob_ready) & (~(|internal_iob_wstrb));"
        )?;
        writeln!(s, "        rready_int = 1'b1;")?;
        writeln!(s, "        wready_int = 1'b1;")?;
        writeln!(s)?;
        s.push_str(&self.response);
        writeln!(s)?;
        writeln!(s, "        ready_nxt = 1'b0;")?;
        writeln!(s, "        rvalid_nxt = 1'b0;")?;
        writeln!(s, "        state_nxt = state;")?;
        writeln!(s)?;
        writeln!(s, "        case (state)")?;
        writeln!(s, "            WAIT_REQ: begin")?;
        writeln!(s, "                if (internal_iob_valid & (!internal_iob_ready)) begin")?;
        writeln!(s, "                    ready_nxt = |internal_iob_wstrb ? wready_int : rready_int;")?;
        writeln!(s, "                    if (ready_nxt && (!(|internal_iob_wstrb))) begin")?;
        writeln!(s, "                        state_nxt = WAIT_RVALID;")?;
        writeln!(s, "                    end")?;
        writeln!(s, "                end")?;
        writeln!(s, "            end")?;
        writeln!(s, "            default: begin")?;
        writeln!(s, "                if (rvalid_int) begin")?;
        writeln!(s, "                    rvalid_nxt = 1'b1;")?;
        writeln!(s, "                    state_nxt = WAIT_REQ;")?;
        writeln!(s, "                end")?;
        writeln!(s, "            end")?;
        writeln!(s, "        endcase")?;
        writeln!(s, "    end")?;
        Ok(())
    }
}

/// Builds the register file fragment for the resolved table.
pub(super) fn generate(ctx: &Context) -> Result<HardwareFragment> {
    let mut builder = Builder::new(ctx);
    builder.interface()?;
    builder.addresses()?;

    for reg in ctx.table.registers() {
        if let Some(port) = register_port(reg) {
            builder.fragment.ports.push(port);
        }
    }
    for reg in ctx.table.registers() {
        if reg.register.access.is_write() {
            builder.register_header(reg)?;
            builder.write_register(reg)?;
        }
    }
    for reg in ctx.table.registers() {
        if reg.register.access == Access::Read {
            builder.register_header(reg)?;
        }
        if reg.register.access.is_read() {
            builder.read_register(reg)?;
        }
    }
    builder.protocol()?;
    Ok(builder.fragment)
}
