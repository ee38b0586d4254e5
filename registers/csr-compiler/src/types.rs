// Licensed under the Apache-2.0 license

//! Typed module description: parameters, registers and register groups.
//!
//! Module descriptions are read from TOML into loosely typed `Raw*`
//! structures and validated once into the types below. After validation no
//! other part of the compiler needs to check for missing fields or unknown
//! access strings.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::Deserialize;

use crate::config::CsrConfig;
use crate::error::{CsrError, Result};
use crate::expr::{ParamExpr, Valuation};

/// Name of the register that reports the module version.
pub const VERSION_REGISTER: &str = "version";
/// Group that receives the version register when the module has none.
pub const GENERAL_GROUP: &str = "general";
/// Group appended when interrupt registers are enabled.
pub const INTERRUPT_GROUP: &str = "interrupt_csrs";

/// Access direction of a register as seen from software.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn is_read(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

impl FromStr for Access {
    type Err = CsrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R" => Ok(Access::Read),
            "W" => Ok(Access::Write),
            "RW" | "WR" => Ok(Access::ReadWrite),
            _ => Err(CsrError::config(format!(
                "unsupported access type `{s}` (expected R, W or RW)"
            ))),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "R"),
            Access::Write => write!(f, "W"),
            Access::ReadWrite => write!(f, "RW"),
        }
    }
}

/// A named hardware configuration quantity.
///
/// Each of the three numeric fields is an expression that may reference
/// other parameters, or `None` when the description marks it `NA`/`ND`.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Option<ParamExpr>,
    pub min: Option<ParamExpr>,
    pub max: Option<ParamExpr>,
    pub descr: String,
}

impl Parameter {
    /// Builds a parameter from field texts; `"NA"` and `"ND"` mark a field
    /// as not available.
    pub fn new(name: &str, value: &str, min: &str, max: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            value: optional_expr(value)?,
            min: optional_expr(min)?,
            max: optional_expr(max)?,
            descr: String::new(),
        })
    }

    pub fn field(&self, mode: Valuation) -> Option<&ParamExpr> {
        match mode {
            Valuation::Value => self.value.as_ref(),
            Valuation::Min => self.min.as_ref(),
            Valuation::Max => self.max.as_ref(),
        }
    }
}

fn optional_expr(text: &str) -> Result<Option<ParamExpr>> {
    match text.trim() {
        "NA" | "ND" | "" => Ok(None),
        other => ParamExpr::parse(other).map(Some),
    }
}

/// One control/status register declaration.
///
/// `address` is `None` until the allocator places the register.
#[derive(Clone, Debug, PartialEq)]
pub struct Register {
    pub name: String,
    pub access: Access,
    pub n_bits: ParamExpr,
    pub rst_val: u64,
    pub address: Option<u64>,
    /// Base-2 logarithm of the number of array elements.
    pub log2n_items: ParamExpr,
    /// The compiler instantiates the storage element itself.
    pub auto: bool,
    pub descr: String,
}

impl Register {
    /// A scalar auto register with reset value 0 and no fixed address.
    pub fn new(name: &str, access: Access, n_bits: ParamExpr) -> Self {
        Self {
            name: name.to_string(),
            access,
            n_bits,
            rst_val: 0,
            address: None,
            log2n_items: ParamExpr::literal(0),
            auto: true,
            descr: String::new(),
        }
    }

    pub fn rst_val(mut self, rst_val: u64) -> Self {
        self.rst_val = rst_val;
        self
    }

    pub fn address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    pub fn log2n_items(mut self, log2n_items: ParamExpr) -> Self {
        self.log2n_items = log2n_items;
        self
    }

    pub fn auto(mut self, auto: bool) -> Self {
        self.auto = auto;
        self
    }

    pub fn descr(mut self, descr: &str) -> Self {
        self.descr = descr.to_string();
        self
    }

    pub fn is_version(&self) -> bool {
        self.name.eq_ignore_ascii_case(VERSION_REGISTER)
    }
}

/// Registers emitted and addressed together, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterGroup {
    pub name: String,
    pub descr: String,
    pub regs: Vec<Register>,
}

impl RegisterGroup {
    pub fn new(name: &str, descr: &str) -> Self {
        Self {
            name: name.to_string(),
            descr: descr.to_string(),
            regs: Vec::new(),
        }
    }

    pub fn reg(mut self, reg: Register) -> Self {
        self.regs.push(reg);
        self
    }
}

/// A validated module description.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrModule {
    /// Module name; prefixes every generated file and macro.
    pub name: String,
    pub version: Version,
    pub params: Vec<Parameter>,
    pub groups: Vec<RegisterGroup>,
    pub config: CsrConfig,
}

impl CsrModule {
    pub fn new(name: &str, version: Version, config: CsrConfig) -> Self {
        Self {
            name: name.to_string(),
            version,
            params: Vec::new(),
            groups: Vec::new(),
            config,
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn group(mut self, group: RegisterGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Parses and validates a TOML module description.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawModule = toml::from_str(text)?;
        raw.validate()
    }

    /// Flattens the groups into the table the allocator consumes.
    ///
    /// Checks the register declarations and injects the version register
    /// and, when enabled, the interrupt registers.
    pub fn register_table(&self) -> Result<RegisterTable> {
        self.config.validate()?;
        if self.groups.iter().all(|g| g.regs.is_empty()) {
            return Err(CsrError::config(format!(
                "module `{}` declares no registers",
                self.name
            )));
        }

        let mut groups = self.groups.clone();
        if self.config.interrupt_csrs && !groups.iter().any(|g| g.name == INTERRUPT_GROUP) {
            groups.push(interrupt_group());
        }
        let has_version = groups
            .iter()
            .flat_map(|g| g.regs.iter())
            .any(Register::is_version);
        if !has_version {
            let version = version_register(&self.version)?;
            match groups.iter_mut().find(|g| g.name == GENERAL_GROUP) {
                Some(general) => general.regs.push(version),
                None => groups.push(
                    RegisterGroup::new(GENERAL_GROUP, "General Registers.").reg(version),
                ),
            }
        }

        let mut seen = HashSet::new();
        for reg in groups.iter().flat_map(|g| g.regs.iter()) {
            if reg.name.is_empty() {
                return Err(CsrError::config("register with an empty name"));
            }
            if !seen.insert(reg.name.to_ascii_lowercase()) {
                return Err(CsrError::config(format!(
                    "register `{}` is declared more than once",
                    reg.name
                )));
            }
        }
        Ok(RegisterTable { groups })
    }
}

/// Packs `major.minor` as two decimal digits each, one per nibble.
///
/// # Examples
/// ```
/// use csr_compiler::types::version_reset_value;
/// let v = semver::Version::new(12, 34, 0);
/// assert_eq!(version_reset_value(&v).unwrap(), 0x1234);
/// ```
pub fn version_reset_value(version: &Version) -> Result<u64> {
    if version.major > 99 || version.minor > 99 {
        return Err(CsrError::config(format!(
            "version {version} does not fit the version register (components must be below 100)"
        )));
    }
    let digits = |n: u64| ((n / 10) << 4) | (n % 10);
    Ok((digits(version.major) << 8) | digits(version.minor))
}

/// Parses a module version, accepting the `major.minor` and `V0.1` forms.
pub fn parse_version(text: &str) -> Result<Version> {
    let trimmed = text.trim().trim_start_matches(['V', 'v']);
    let completed = if trimmed.split('.').count() == 2 {
        format!("{trimmed}.0")
    } else {
        trimmed.to_string()
    };
    Version::parse(&completed)
        .map_err(|e| CsrError::config(format!("invalid module version `{text}`: {e}")))
}

fn version_register(version: &Version) -> Result<Register> {
    Ok(
        Register::new(VERSION_REGISTER, Access::Read, ParamExpr::literal(16))
            .rst_val(version_reset_value(version)?)
            .descr("Product version. This 16-bit register uses nibbles to represent decimal numbers using their binary values. The two most significant nibbles represent the integer part of the version, and the two least significant nibbles represent the decimal part."),
    )
}

fn interrupt_group() -> RegisterGroup {
    let reg = |name: &str, access, descr: &str| {
        Register::new(name, access, ParamExpr::literal(32)).descr(descr)
    };
    RegisterGroup::new(INTERRUPT_GROUP, "Interrupt registers.")
        .reg(reg("status", Access::Read, "Interrupt status: bit i is set when interrupt i is pending."))
        .reg(reg("mask", Access::Write, "Interrupt mask: bit i disables interrupt i."))
        .reg(reg("clear", Access::Write, "Interrupt clear: writing 1 to bit i clears interrupt i."))
}

/// Register groups after validation, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterTable {
    pub groups: Vec<RegisterGroup>,
}

impl RegisterTable {
    /// All registers in declaration order across groups.
    pub fn registers(&self) -> impl Iterator<Item = &Register> {
        self.groups.iter().flat_map(|g| g.regs.iter())
    }

    pub fn len(&self) -> usize {
        self.registers().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//=============================================================================
// TOML input
//=============================================================================

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn to_text(&self) -> String {
        match self {
            IntOrString::Int(v) => v.to_string(),
            IntOrString::Str(s) => s.clone(),
        }
    }

    fn to_expr(&self) -> Result<ParamExpr> {
        match self {
            IntOrString::Int(v) => Ok(ParamExpr::literal(*v)),
            IntOrString::Str(s) => ParamExpr::parse(s),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawModule {
    name: Option<String>,
    version: Option<String>,
    csr_if: Option<String>,
    autoaddr: Option<bool>,
    rw_overlap: Option<bool>,
    interrupt_csrs: Option<bool>,
    data_w: Option<u32>,
    #[serde(default)]
    confs: Vec<RawParam>,
    #[serde(default)]
    csrs: Vec<RawGroup>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawParam {
    name: Option<String>,
    val: Option<IntOrString>,
    min: Option<IntOrString>,
    max: Option<IntOrString>,
    #[serde(default)]
    descr: String,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    name: Option<String>,
    #[serde(default)]
    descr: String,
    #[serde(default)]
    regs: Vec<RawRegister>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RawRegister {
    name: Option<String>,
    #[serde(rename = "type")]
    access: Option<String>,
    n_bits: Option<IntOrString>,
    rst_val: Option<i64>,
    addr: Option<i64>,
    log2n_items: Option<IntOrString>,
    autoreg: Option<bool>,
    #[serde(default)]
    descr: String,
}

fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| CsrError::config(format!("missing required field `{what}`")))
}

impl RawModule {
    fn validate(self) -> Result<CsrModule> {
        let name = required(self.name, "name")?;
        let version = parse_version(&required(self.version, "version")?)?;
        let mut config = CsrConfig::new();
        if let Some(csr_if) = self.csr_if {
            config = config.csr_if(csr_if.parse()?);
        }
        if let Some(autoaddr) = self.autoaddr {
            config = config.autoaddr(autoaddr);
        }
        if let Some(rw_overlap) = self.rw_overlap {
            config = config.rw_overlap(rw_overlap);
        }
        if let Some(interrupt_csrs) = self.interrupt_csrs {
            config = config.interrupt_csrs(interrupt_csrs);
        }
        if let Some(data_w) = self.data_w {
            config = config.data_w(data_w);
        }
        config.validate()?;

        if self.csrs.is_empty() {
            return Err(CsrError::config(format!(
                "module `{name}` has no CSR groups"
            )));
        }

        let mut module = CsrModule::new(&name, version, config);
        for raw in self.confs {
            module.params.push(raw.validate()?);
        }
        for raw in self.csrs {
            module.groups.push(raw.validate()?);
        }
        Ok(module)
    }
}

impl RawParam {
    fn validate(self) -> Result<Parameter> {
        let name = required(self.name, "confs.name")?;
        let text = |field: Option<IntOrString>| field.map(|f| f.to_text()).unwrap_or_default();
        let mut param = Parameter::new(&name, &text(self.val), &text(self.min), &text(self.max))?;
        param.descr = self.descr;
        Ok(param)
    }
}

impl RawGroup {
    fn validate(self) -> Result<RegisterGroup> {
        let name = required(self.name, "csrs.name")?;
        if self.regs.is_empty() {
            return Err(CsrError::config(format!("group `{name}` has no registers")));
        }
        let mut group = RegisterGroup::new(&name, &self.descr);
        for raw in self.regs {
            group.regs.push(raw.validate()?);
        }
        Ok(group)
    }
}

impl RawRegister {
    fn validate(self) -> Result<Register> {
        let name = required(self.name, "csrs.regs.name")?;
        let context = |e: CsrError| match e {
            CsrError::Configuration(msg) => {
                CsrError::Configuration(format!("register `{name}`: {msg}"))
            }
            other => other,
        };
        let access: Access = required(self.access, "type")
            .and_then(|a| a.parse())
            .map_err(context)?;
        let n_bits = required(self.n_bits, "n_bits").map_err(context)?.to_expr()?;
        let rst_val = u64::try_from(self.rst_val.unwrap_or(0)).map_err(|_| {
            CsrError::config(format!("register `{name}`: negative reset value"))
        })?;

        let mut reg = Register::new(&name, access, n_bits)
            .rst_val(rst_val)
            .auto(self.autoreg.unwrap_or(true))
            .descr(&self.descr);
        if let Some(log2n_items) = self.log2n_items {
            reg = reg.log2n_items(log2n_items.to_expr()?);
        }
        match self.addr {
            None | Some(-1) => {}
            Some(addr) if addr >= 0 => reg = reg.address(addr as u64),
            Some(addr) => {
                return Err(CsrError::address(
                    &name,
                    format!("invalid address {addr}"),
                ))
            }
        }
        Ok(reg)
    }
}
