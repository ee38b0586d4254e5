// Licensed under the Apache-2.0 license

//! Tests for the code generators.

mod test {
    use super::super::{generate_csrs, generate_csrs_from_str};
    use crate::error::CsrError;
    use crate::output::CsrArtifacts;
    use crate::types::{Access, CsrModule, Register, RegisterGroup};
    use crate::{CsrConfig, ParamExpr};
    use semver::Version;

    const TIMER: &str = r#"
        name = "iob_timer"
        version = "0.1"

        [[confs]]
        name = "DATA_W"
        val = 32
        min = "NA"
        max = 32

        [[confs]]
        name = "N"
        val = 1
        min = 0
        max = 2

        [[csrs]]
        name = "timer"
        descr = "Timer registers"

        [[csrs.regs]]
        name = "reset"
        type = "W"
        n_bits = 1
        descr = "Soft reset"

        [[csrs.regs]]
        name = "enable"
        type = "W"
        n_bits = 1
        descr = "Counter enable"

        [[csrs.regs]]
        name = "sample"
        type = "W"
        n_bits = 1
        autoreg = false
        descr = "Sample the counter"

        [[csrs.regs]]
        name = "data"
        type = "R"
        n_bits = 64
        autoreg = false
        descr = "Sampled counter value"

        [[csrs.regs]]
        name = "count"
        type = "R"
        n_bits = "DATA_W"
        descr = "Free running count"

        [[csrs.regs]]
        name = "fifo"
        type = "R"
        n_bits = 8
        log2n_items = "N"
        descr = "Capture FIFO"

        [[csrs.regs]]
        name = "cfg"
        type = "RW"
        n_bits = 16
        rst_val = 5
        descr = "Configuration"
    "#;

    fn timer() -> CsrArtifacts {
        generate_csrs_from_str(TIMER).unwrap()
    }

    fn contents<'a>(artifacts: &'a CsrArtifacts, name: &str) -> &'a str {
        &artifacts
            .file(name)
            .unwrap_or_else(|| panic!("missing {name}"))
            .contents
    }

    /// Collects `<keyword> NAME VALUE` lines, e.g. C `#define`s.
    fn defines(text: &str, keyword: &str) -> Vec<(String, String)> {
        text.lines()
            .filter_map(|line| line.trim().strip_prefix(keyword))
            .filter_map(|rest| {
                let mut parts = rest.split_whitespace();
                Some((parts.next()?.to_string(), parts.next()?.to_string()))
            })
            .collect()
    }

    #[test]
    fn test_timer_addresses() {
        let artifacts = timer();
        let table = &artifacts.table;
        let expected = [
            ("reset", 0),
            ("enable", 1),
            ("sample", 2),
            ("data", 8),
            ("count", 16),
            ("fifo", 20),
            ("cfg", 24),
            ("version", 26),
        ];
        for (name, address) in expected {
            assert_eq!(table.address_of(name), Some(address), "{name}");
        }
        assert_eq!(table.core_addr_w, 5);
    }

    #[test]
    fn test_artifact_names() {
        let artifacts = timer();
        let names: Vec<&str> = artifacts.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "iob_timer_csrs.v",
                "iob_timer_csrs_conf.vh",
                "iob_timer_csrs_def.vh",
                "iob_timer_csrs_lparam.vs",
                "iob_timer_csrs.h",
                "iob_timer_csrs_emb.c",
                "iob_timer_csrs_verilator.h",
                "iob_timer_csrs_emb_verilator.c",
                "iob_timer_csrs_emb_tb.vs",
                "csrs.tex",
                "timer_csrs_tab.tex",
                "general_csrs_tab.tex",
            ]
        );
    }

    #[test]
    fn test_address_macros_match_hardware_decode() {
        let artifacts = timer();
        let snippet = &artifacts.hardware.snippet;
        let header = defines(contents(&artifacts, "iob_timer_csrs.h"), "#define");
        let instance = defines(contents(&artifacts, "iob_timer_csrs_def.vh"), "`define");
        let lparam = contents(&artifacts, "iob_timer_csrs_lparam.vs");

        for reg in artifacts.table.registers() {
            let upper = reg.register.name.to_uppercase();
            let macro_name = format!("IOB_TIMER_{upper}_ADDR");
            let address = reg.address.to_string();
            let lookup = |macros: &[(String, String)]| {
                macros
                    .iter()
                    .find(|(n, _)| *n == macro_name)
                    .map(|(_, v)| v.clone())
            };
            assert_eq!(lookup(&header), Some(address.clone()), "{macro_name} in C header");
            assert_eq!(lookup(&instance), Some(address.clone()), "{macro_name} in def.vh");
            assert!(lparam.contains(&format!("localparam {macro_name} = {address};")));
            assert!(snippet.contains(&format!(", address {address}, ")));

            if reg.register.access.is_write() {
                let element = if reg.layout.n_items() > 1 && reg.register.auto {
                    format!("{}_0", reg.register.name)
                } else {
                    reg.register.name.clone()
                };
                assert!(
                    snippet.contains(&format!(
                        "assign {element}_addressed_w = (waddr >= {address})"
                    )),
                    "write decode of {element}"
                );
            }
        }
    }

    #[test]
    fn test_address_width_consistent() {
        let artifacts = timer();
        let width = artifacts.table.core_addr_w;
        for file in ["iob_timer_csrs.h", "iob_timer_csrs_verilator.h"] {
            assert!(contents(&artifacts, file)
                .contains(&format!("#define IOB_TIMER_CSRS_ADDR_W {width}\n")));
        }
        assert!(contents(&artifacts, "iob_timer_csrs_def.vh")
            .contains(&format!("`define IOB_TIMER_CSRS_ADDR_W {width}\n")));
        assert!(contents(&artifacts, "iob_timer_csrs_lparam.vs")
            .contains(&format!("localparam IOB_TIMER_CSRS_ADDR_W = {width};")));
        assert!(contents(&artifacts, "iob_timer_csrs.v")
            .contains(&format!("parameter ADDR_W = {width},")));
    }

    #[test]
    fn test_auto_array_elements() {
        let module = CsrModule::new("m", Version::new(1, 0, 0), CsrConfig::new())
            .group(
                RegisterGroup::new("g", "")
                    .reg(
                        Register::new("data", Access::Read, ParamExpr::literal(8))
                            .log2n_items(ParamExpr::literal(2)),
                    )
                    .reg(
                        Register::new("wdata", Access::Write, ParamExpr::literal(8))
                            .log2n_items(ParamExpr::literal(2)),
                    ),
            );
        let artifacts = generate_csrs(&module).unwrap();
        let snippet = &artifacts.hardware.snippet;
        let port = artifacts
            .hardware
            .ports
            .iter()
            .find(|p| p.name == "data")
            .unwrap();
        let inputs: Vec<String> = port.signals.iter().map(|s| s.port_name()).collect();
        assert_eq!(inputs, ["data_0_i", "data_1_i", "data_2_i", "data_3_i"]);

        for i in 0..4u64 {
            assert!(snippet.contains(&format!("data_{i}_rsel = word_addr == 0;")));
            assert!(snippet.contains(&format!(
                "rdata_nxt[{0}+:8] = rdata_nxt[{0}+:8] | data_{i}_i;",
                8 * i
            )));
            let address = 4 + i;
            assert!(snippet.contains(&format!(
                "assign wdata_{i}_addressed_w = (waddr >= {address}) && (waddr < {});",
                address + 1
            )));
            assert!(snippet.contains(&format!("assign wdata_{i}_wen = ")));
            assert!(artifacts
                .hardware
                .instances
                .iter()
                .any(|inst| inst.instance_name == format!("wdata_{i}_datareg")));
        }

        let header = contents(&artifacts, "m_csrs.h");
        assert!(header.contains("uint8_t M_GET_DATA(int addr);"));
        assert!(header.contains("void M_SET_WDATA(uint8_t value, int addr);"));
        let source = contents(&artifacts, "m_csrs_emb.c");
        assert!(source.contains("((base) + (M_DATA_ADDR) + (addr << 0))"));
    }

    #[test]
    fn test_manual_registers_use_handshakes() {
        let artifacts = timer();
        let snippet = &artifacts.hardware.snippet;
        assert!(snippet.contains("assign sample_wen_o = (sample_addressed_w & (internal_iob_valid & internal_iob_ready)) ? |internal_iob_wstrb : 1'b0;"));
        assert!(snippet.contains("wready_int = sample_wready_i;"));
        assert!(snippet.contains("assign data_ren_o = data_addressed_r"));
        assert!(snippet.contains("rvalid_int = data_rvalid_i;"));
        assert!(snippet.contains("rready_int = data_rready_i;"));
    }

    #[test]
    fn test_wide_read_register_split_into_words() {
        let artifacts = timer();
        let snippet = &artifacts.hardware.snippet;
        assert!(snippet.contains("assign data_rdata_ext = data_rdata_i;"));
        assert!(snippet.contains("data_w0_rsel = word_addr == 8;"));
        assert!(snippet.contains("data_w1_rsel = word_addr == 12;"));
        assert!(snippet.contains("rdata_nxt[0+:32] = rdata_nxt[0+:32] | data_rdata_ext[32+:32];"));
        assert!(contents(&artifacts, "iob_timer_csrs.h").contains("uint64_t IOB_TIMER_GET_DATA();"));
    }

    #[test]
    fn test_read_write_and_version() {
        let artifacts = timer();
        let snippet = &artifacts.hardware.snippet;
        assert!(snippet.contains("rdata_nxt[0+:16] = rdata_nxt[0+:16] | cfg_o;"));
        assert!(snippet.contains("rdata_nxt[16+:16] = rdata_nxt[16+:16] | 16'h0001;"));
        let cfg = artifacts
            .hardware
            .instances
            .iter()
            .find(|i| i.instance_name == "cfg_datareg")
            .unwrap();
        assert!(cfg.parameters.contains(&("RST_VAL".to_string(), "16'd5".to_string())));
        assert!(!artifacts.hardware.ports.iter().any(|p| p.name == "version"));

        let header = contents(&artifacts, "iob_timer_csrs.h");
        assert!(header.contains("void IOB_TIMER_SET_CFG(uint16_t value);"));
        assert!(header.contains("uint16_t IOB_TIMER_GET_CFG();"));
        assert!(header.contains("uint16_t IOB_TIMER_GET_VERSION();"));
    }

    #[test]
    fn test_symbolic_widths_in_instance_header() {
        let artifacts = timer();
        let def = contents(&artifacts, "iob_timer_csrs_def.vh");
        assert!(def.contains("`define IOB_TIMER_COUNT_W ((DATA_W > 1) ? DATA_W : 1)\n"));
        assert!(def.contains("`define IOB_TIMER_RESET_W 1\n"));
        assert!(def.contains("`define IOB_TIMER_FIFO_ADDR_W ((N > 1) ? N : 1)\n"));
        let lparam = contents(&artifacts, "iob_timer_csrs_lparam.vs");
        assert!(lparam.contains("localparam IOB_TIMER_COUNT_W = 32;"));
        assert!(lparam.contains("localparam IOB_TIMER_FIFO_ADDR_W = 1;"));
    }

    #[test]
    fn test_instance_header_includes_configuration() {
        let artifacts = timer();
        let def = contents(&artifacts, "iob_timer_csrs_def.vh");
        assert!(def.starts_with("`include \"iob_timer_csrs_conf.vh\"\n"));
        let conf = defines(contents(&artifacts, "iob_timer_csrs_conf.vh"), "`define");
        assert_eq!(
            conf,
            [
                ("IOB_TIMER_CSRS_DATA_W".to_string(), "32".to_string()),
                ("IOB_TIMER_CSRS_N".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_host_simulation_and_testbench() {
        let artifacts = timer();
        let header = contents(&artifacts, "iob_timer_csrs_verilator.h");
        assert!(header.contains("uint8_t IOB_TIMER_GET_FIFO(int addr, iob_native_t *native_if);"));
        assert!(header.contains("void IOB_TIMER_SET_ENABLE(uint8_t value, iob_native_t *native_if);"));
        let source = contents(&artifacts, "iob_timer_csrs_emb_verilator.c");
        assert!(source.contains(
            "  iob_write((IOB_TIMER_ENABLE_ADDR), value, IOB_TIMER_ENABLE_W, native_if);"
        ));
        assert!(source.contains(
            "  return (uint8_t)iob_read((IOB_TIMER_FIFO_ADDR) + (addr << 0), native_if);"
        ));
        let tb = contents(&artifacts, "iob_timer_csrs_emb_tb.vs");
        assert!(tb.contains("task static IOB_TIMER_SET_RESET(input reg [8-1:0] value);"));
        assert!(tb.contains(
            "task static IOB_TIMER_GET_FIFO(input reg [ADDR_W-1:0] addr, output reg [8-1:0] rvalue);"
        ));
    }

    #[test]
    fn test_documentation_tables() {
        let artifacts = timer();
        let index = contents(&artifacts, "csrs.tex");
        assert!(index.contains("\\input timer_csrs_tab"));
        assert!(index.contains("\\input general_csrs_tab"));
        let table = contents(&artifacts, "timer_csrs_tab.tex");
        assert!(table.contains("    fifo & R & 20 & 8 & 0 & Capture FIFO \\\\ \\hline"));
        assert!(table.contains("    count & R & 16 & DATA\\_W & 0 & Free running count \\\\ \\hline"));
        let general = contents(&artifacts, "general_csrs_tab.tex");
        assert!(general.contains("    version & R & 26 & 16 & 1 & "));
    }

    #[test]
    fn test_bus_adapters() {
        let native = timer();
        assert!(native
            .hardware
            .snippet
            .contains("assign internal_iob_valid = iob_valid_i;"));

        let apb = generate_csrs_from_str(&TIMER.replace(
            "version = \"0.1\"",
            "version = \"0.1\"\ncsr_if = \"apb\"",
        ))
        .unwrap();
        let converter = apb
            .hardware
            .instances
            .iter()
            .find(|i| i.core_name == "apb2iob")
            .unwrap();
        assert!(converter
            .connections
            .contains(&("apb_sel_i".to_string(), "apb_sel_i".to_string())));
        assert!(converter
            .connections
            .contains(&("iob_valid_o".to_string(), "internal_iob_valid".to_string())));
        assert!(!apb.hardware.snippet.contains("iob_valid_i"));
        assert!(contents(&apb, "iob_timer_csrs.v").contains("input apb_sel_i,"));
    }

    #[test]
    fn test_type_error_for_unsupported_width() {
        let module = CsrModule::new("m", Version::new(1, 0, 0), CsrConfig::new()).group(
            RegisterGroup::new("g", "").reg(Register::new(
                "odd",
                Access::Read,
                ParamExpr::literal(40),
            )),
        );
        match generate_csrs(&module) {
            Err(CsrError::Type { register, bytes }) => {
                assert_eq!(register, "odd");
                assert_eq!(bytes, 5);
            }
            other => panic!("expected type error, got {other:?}"),
        }
    }

    #[test]
    fn test_write_register_wider_than_bus() {
        let group = RegisterGroup::new("g", "").reg(Register::new(
            "wide",
            Access::Write,
            ParamExpr::literal(64),
        ));
        let narrow = CsrModule::new("m", Version::new(1, 0, 0), CsrConfig::new()).group(group.clone());
        assert!(matches!(
            generate_csrs(&narrow),
            Err(CsrError::Configuration(_))
        ));

        let wide = CsrModule::new("m", Version::new(1, 0, 0), CsrConfig::new().data_w(64)).group(group);
        let artifacts = generate_csrs(&wide).unwrap();
        assert!(artifacts
            .hardware
            .snippet
            .contains("assign wide_wdata = internal_iob_wdata[0+:64];"));
    }

    #[test]
    fn test_reset_value_wider_than_register() {
        let module = |rst_val| {
            CsrModule::new("m", Version::new(1, 0, 0), CsrConfig::new()).group(
                RegisterGroup::new("g", "").reg(
                    Register::new("flag", Access::Write, ParamExpr::literal(1)).rst_val(rst_val),
                ),
            )
        };
        match generate_csrs(&module(5)) {
            Err(CsrError::Configuration(msg)) => assert!(msg.contains("`flag`"), "{msg}"),
            other => panic!("expected configuration error, got {other:?}"),
        }
        let artifacts = generate_csrs(&module(1)).unwrap();
        assert!(artifacts
            .hardware
            .instances
            .iter()
            .any(|i| i.parameters.iter().any(|(k, v)| k == "RST_VAL" && v == "1'd1")));

        let narrow = TIMER.replace("rst_val = 5", "rst_val = 65536");
        assert!(matches!(
            generate_csrs_from_str(&narrow),
            Err(CsrError::Configuration(_))
        ));
    }

    #[test]
    fn test_errors_abort_generation() {
        let manual = r#"
            name = "m"
            version = "1.0"
            autoaddr = false
            [[csrs]]
            name = "g"
            [[csrs.regs]]
            name = "a"
            type = "W"
            n_bits = 32
            addr = 0
            [[csrs.regs]]
            name = "b"
            type = "W"
            n_bits = 32
            addr = 2
        "#;
        match generate_csrs_from_str(manual) {
            Err(CsrError::Address { register, .. }) => assert_eq!(register, "b"),
            other => panic!("expected address error, got {other:?}"),
        }

        let undefined = TIMER.replace("n_bits = \"DATA_W\"", "n_bits = \"2*WIDTH+1\"");
        assert!(matches!(
            generate_csrs_from_str(&undefined),
            Err(CsrError::Expression { .. })
        ));
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(timer().files, timer().files);
    }
}
