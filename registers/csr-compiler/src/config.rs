// Licensed under the Apache-2.0 license

//! Build-wide policy for register allocation and bus generation.
//!
//! [`CsrConfig`] is passed explicitly into every allocator and generator
//! call; nothing about the module being compiled is kept in shared state.

use std::fmt;
use std::str::FromStr;

use crate::error::CsrError;

/// External bus protocol presented at the register file boundary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CsrInterface {
    /// Internal request/response bus, driven directly from the ports.
    #[default]
    Native,
    Apb,
    /// AXI-Lite.
    Axil,
    Axi,
}

impl CsrInterface {
    /// Converter core instantiated in front of the internal bus, if any.
    pub fn converter(&self) -> Option<&'static str> {
        match self {
            CsrInterface::Native => None,
            CsrInterface::Apb => Some("apb2iob"),
            CsrInterface::Axil => Some("axil2iob"),
            CsrInterface::Axi => Some("axi2iob"),
        }
    }

    /// Signal prefix of the external protocol ports.
    pub fn prefix(&self) -> &'static str {
        match self {
            CsrInterface::Native => "iob",
            CsrInterface::Apb => "apb",
            CsrInterface::Axil => "axil",
            CsrInterface::Axi => "axi",
        }
    }
}

impl FromStr for CsrInterface {
    type Err = CsrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "iob" => Ok(CsrInterface::Native),
            "apb" => Ok(CsrInterface::Apb),
            "axil" | "axi-lite" | "axi_lite" => Ok(CsrInterface::Axil),
            "axi" => Ok(CsrInterface::Axi),
            other => Err(CsrError::config(format!(
                "unknown CSR interface `{other}` (expected native, apb, axil or axi)"
            ))),
        }
    }
}

impl fmt::Display for CsrInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CsrInterface::Native => "native",
            CsrInterface::Apb => "apb",
            CsrInterface::Axil => "axil",
            CsrInterface::Axi => "axi",
        };
        write!(f, "{name}")
    }
}

/// Allocation and generation policy for one module build.
///
/// # Example
///
/// ```
/// use csr_compiler::config::{CsrConfig, CsrInterface};
///
/// let config = CsrConfig::new()
///     .autoaddr(false)
///     .rw_overlap(true)
///     .csr_if(CsrInterface::Apb);
/// assert_eq!(config.bus_bytes(), 4);
/// assert!(config.validate().is_ok());
///
/// assert!(CsrConfig::new().data_w(24).validate().is_err());
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CsrConfig {
    /// Place registers automatically; when `false` every register except
    /// `version` must carry an address.
    pub autoaddr: bool,

    /// Let read and write registers share addresses.
    pub rw_overlap: bool,

    pub csr_if: CsrInterface,

    /// Bus data width in bits.
    pub data_w: u32,

    /// Append the `status`/`mask`/`clear` interrupt registers.
    pub interrupt_csrs: bool,
}

impl Default for CsrConfig {
    fn default() -> Self {
        Self {
            autoaddr: true,
            rw_overlap: false,
            csr_if: CsrInterface::Native,
            data_w: 32,
            interrupt_csrs: false,
        }
    }
}

impl CsrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn autoaddr(mut self, autoaddr: bool) -> Self {
        self.autoaddr = autoaddr;
        self
    }

    pub fn rw_overlap(mut self, rw_overlap: bool) -> Self {
        self.rw_overlap = rw_overlap;
        self
    }

    pub fn csr_if(mut self, csr_if: CsrInterface) -> Self {
        self.csr_if = csr_if;
        self
    }

    pub fn data_w(mut self, data_w: u32) -> Self {
        self.data_w = data_w;
        self
    }

    pub fn interrupt_csrs(mut self, interrupt_csrs: bool) -> Self {
        self.interrupt_csrs = interrupt_csrs;
        self
    }

    /// Bytes per bus word.
    pub fn bus_bytes(&self) -> u64 {
        u64::from(self.data_w / 8)
    }

    pub fn validate(&self) -> Result<(), CsrError> {
        if !matches!(self.data_w, 8 | 16 | 32 | 64) {
            return Err(CsrError::config(format!(
                "bus data width {} is not one of 8, 16, 32, 64",
                self.data_w
            )));
        }
        Ok(())
    }
}
