// Licensed under the Apache-2.0 license

//! Address allocation.
//!
//! Registers are placed in declaration order by a bump allocator with one
//! cursor per access direction. Each register occupies a power-of-two span
//! and is placed at a multiple of that span. How the two cursors interact
//! after a placement is decided by an [`OverlapPolicy`].
//!
//! ```text
//! RegisterTable ──allocate──► ResolvedTable { groups, core_addr_w }
//!                   │
//!                   ├── RegisterLayout::of(reg, Max)   span of every register
//!                   ├── manual: alignment + ordering checks against the cursors
//!                   └── auto:   cursor rounded up to the span
//! ```

use log::{debug, info, warn};

use crate::config::CsrConfig;
use crate::error::{CsrError, Result};
use crate::expr::{ParamEnv, Valuation};
use crate::types::{Access, Register, RegisterGroup, RegisterTable};
use crate::util::{bceil, ceil_log2};

/// Largest array depth accepted, as a base-2 logarithm.
const MAX_LOG2N_ITEMS: u64 = 32;

/// Largest depth of an array whose elements the compiler instantiates one by
/// one, as a base-2 logarithm.
pub const MAX_AUTO_LOG2N_ITEMS: u32 = 10;

/// Width of the largest register address space, in bits.
pub const MAX_ADDR_W: u32 = 32;

/// Storage geometry of one register.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegisterLayout {
    /// Bytes per element, rounded up to a whole number of bytes.
    pub n_bytes: u64,
    pub log2n_items: u32,
    /// Base-2 logarithm of the span in bytes.
    pub addr_w: u32,
}

impl RegisterLayout {
    /// Computes the layout with every parameter taken at `mode`.
    ///
    /// A 3-byte register is padded to 4 bytes so that its span stays a power
    /// of two.
    pub fn of(reg: &Register, env: &ParamEnv, mode: Valuation) -> Result<Self> {
        let n_bits = reg.n_bits.eval(env, mode)?;
        if n_bits < 1 {
            return Err(CsrError::config(format!(
                "register `{}` is {n_bits} bits wide in {mode} mode",
                reg.name
            )));
        }
        let n_bits = n_bits as u64;
        let mut n_bytes = n_bits.div_ceil(8);
        if n_bytes == 3 {
            if mode == Valuation::Max {
                warn!(
                    "register {} is {n_bits} bits wide, padding its span to 4 bytes",
                    reg.name
                );
            }
            n_bytes = 4;
        }
        let log2n_items = reg.log2n_items.eval_unsigned(env, mode)?;
        if log2n_items > MAX_LOG2N_ITEMS {
            return Err(CsrError::config(format!(
                "register `{}` has 2^{log2n_items} elements",
                reg.name
            )));
        }
        let log2n_items = log2n_items as u32;
        if reg.auto && log2n_items > MAX_AUTO_LOG2N_ITEMS {
            return Err(CsrError::config(format!(
                "auto register `{}` has 2^{log2n_items} elements, at most 2^{MAX_AUTO_LOG2N_ITEMS} are instantiated",
                reg.name
            )));
        }
        let addr_w = log2n_items + ceil_log2(n_bytes);
        if addr_w > MAX_ADDR_W {
            return Err(CsrError::config(format!(
                "register `{}` spans 2^{addr_w} bytes, more than the {MAX_ADDR_W}-bit address space",
                reg.name
            )));
        }
        Ok(Self {
            n_bytes,
            log2n_items,
            addr_w,
        })
    }

    pub fn n_items(&self) -> u64 {
        1 << self.log2n_items
    }

    /// Bytes reserved for the register, all elements included.
    pub fn span(&self) -> u64 {
        1 << self.addr_w
    }
}

/// Next free address in each access direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Cursors {
    pub read: u64,
    pub write: u64,
}

impl Cursors {
    /// The first address a register of `access` may use.
    fn floor(&self, access: Access) -> u64 {
        match access {
            Access::Read => self.read,
            Access::Write => self.write,
            Access::ReadWrite => self.read.max(self.write),
        }
    }

    fn advance(&mut self, access: Access, end: u64) {
        if access.is_read() {
            self.read = end;
        }
        if access.is_write() {
            self.write = end;
        }
    }
}

/// How the read and write cursors relate after each placement.
pub trait OverlapPolicy {
    fn settle(&self, cursors: &mut Cursors);
}

/// Read and write registers never share an address: both cursors move to
/// the furthest one after every placement, manual or automatic.
#[derive(Clone, Copy, Debug, Default)]
pub struct SharedCursor;

impl OverlapPolicy for SharedCursor {
    fn settle(&self, cursors: &mut Cursors) {
        let end = cursors.read.max(cursors.write);
        cursors.read = end;
        cursors.write = end;
    }
}

/// Read and write address spaces are independent.
#[derive(Clone, Copy, Debug, Default)]
pub struct SplitCursors;

impl OverlapPolicy for SplitCursors {
    fn settle(&self, _cursors: &mut Cursors) {}
}

/// A register with its allocated address.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRegister {
    /// The declaration, with `address` filled in.
    pub register: Register,
    pub address: u64,
    /// Worst-case layout used for placement.
    pub layout: RegisterLayout,
}

impl ResolvedRegister {
    /// One past the last byte of the register's span.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.layout.span())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGroup {
    pub name: String,
    pub descr: String,
    pub regs: Vec<ResolvedRegister>,
}

/// Read-only output of the allocator, shared by every generator.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTable {
    pub groups: Vec<ResolvedGroup>,
    /// Width of the byte address bus that covers every register.
    pub core_addr_w: u32,
}

impl ResolvedTable {
    pub fn registers(&self) -> impl Iterator<Item = &ResolvedRegister> {
        self.groups.iter().flat_map(|g| g.regs.iter())
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedRegister> {
        self.registers().find(|r| r.register.name == name)
    }

    /// Allocated address of the register called `name`.
    pub fn address_of(&self, name: &str) -> Option<u64> {
        self.get(name).map(|r| r.address)
    }

    /// The table with every address pinned, suitable as manual input.
    pub fn to_table(&self) -> RegisterTable {
        RegisterTable {
            groups: self
                .groups
                .iter()
                .map(|g| RegisterGroup {
                    name: g.name.clone(),
                    descr: g.descr.clone(),
                    regs: g.regs.iter().map(|r| r.register.clone()).collect(),
                })
                .collect(),
        }
    }
}

/// Allocates addresses using the policy selected by `config.rw_overlap`.
pub fn allocate(table: RegisterTable, env: &ParamEnv, config: &CsrConfig) -> Result<ResolvedTable> {
    if config.rw_overlap {
        allocate_with(table, env, config.autoaddr, &SplitCursors)
    } else {
        allocate_with(table, env, config.autoaddr, &SharedCursor)
    }
}

/// Allocates addresses with an explicit overlap policy.
///
/// In automatic mode no register may carry an address; in manual mode every
/// register except `version` must. The `version` register is always placed
/// automatically.
pub fn allocate_with(
    table: RegisterTable,
    env: &ParamEnv,
    autoaddr: bool,
    policy: &dyn OverlapPolicy,
) -> Result<ResolvedTable> {
    if table.is_empty() {
        return Err(CsrError::config("empty register table"));
    }

    let mut cursors = Cursors::default();
    let mut groups = Vec::with_capacity(table.groups.len());
    for group in table.groups {
        let mut regs = Vec::with_capacity(group.regs.len());
        for mut register in group.regs {
            let layout = RegisterLayout::of(&register, env, Valuation::Max)?;
            let span = layout.span();
            let floor = cursors.floor(register.access);

            let address = match requested_address(&register, autoaddr)? {
                Some(address) => {
                    if address % span != 0 {
                        return Err(CsrError::address(
                            &register.name,
                            format!("address {address} is not aligned to its {span}-byte span"),
                        ));
                    }
                    if address < floor {
                        return Err(CsrError::address(
                            &register.name,
                            format!(
                                "address {address} overlaps previous registers (next free address is {floor})"
                            ),
                        ));
                    }
                    address
                }
                None => bceil(floor, layout.addr_w).ok_or_else(|| {
                    CsrError::address(&register.name, "no aligned address left")
                })?,
            };

            let end = address
                .checked_add(span)
                .filter(|&end| end <= 1 << MAX_ADDR_W)
                .ok_or_else(|| {
                    CsrError::address(
                        &register.name,
                        format!(
                            "address {address} with a {span}-byte span leaves the {MAX_ADDR_W}-bit address space"
                        ),
                    )
                })?;
            cursors.advance(register.access, end);
            policy.settle(&mut cursors);
            debug!(
                "placed {} ({}) at {address:#x}, span {span} bytes",
                register.name, register.access
            );

            register.address = Some(address);
            regs.push(ResolvedRegister {
                register,
                address,
                layout,
            });
        }
        groups.push(ResolvedGroup {
            name: group.name,
            descr: group.descr,
            regs,
        });
    }

    let core_addr_w = ceil_log2(cursors.read.max(cursors.write));
    info!(
        "allocated {} registers, address bus width {core_addr_w}",
        groups.iter().map(|g| g.regs.len()).sum::<usize>()
    );
    Ok(ResolvedTable {
        groups,
        core_addr_w,
    })
}

/// The address the declaration asks for, checked against the addressing mode.
fn requested_address(register: &Register, autoaddr: bool) -> Result<Option<u64>> {
    if register.is_version() {
        return Ok(None);
    }
    match (autoaddr, register.address) {
        (true, Some(address)) => Err(CsrError::address(
            &register.name,
            format!("manual address {address} while in automatic addressing mode"),
        )),
        (false, None) => Err(CsrError::address(
            &register.name,
            "missing address while in manual addressing mode",
        )),
        (_, address) => Ok(address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ParamExpr;

    fn reg(name: &str, access: Access, n_bits: i64) -> Register {
        Register::new(name, access, ParamExpr::literal(n_bits))
    }

    fn table(regs: Vec<Register>) -> RegisterTable {
        let mut group = RegisterGroup::new("g", "");
        group.regs = regs;
        RegisterTable {
            groups: vec![group],
        }
    }

    fn addresses(resolved: &ResolvedTable) -> Vec<u64> {
        resolved.registers().map(|r| r.address).collect()
    }

    fn assert_invariants(resolved: &ResolvedTable) {
        let regs: Vec<_> = resolved.registers().collect();
        for r in &regs {
            assert_eq!(r.address % r.layout.span(), 0, "{} misaligned", r.register.name);
            assert_eq!(r.register.address, Some(r.address));
        }
        for (i, a) in regs.iter().enumerate() {
            for b in &regs[i + 1..] {
                let shared = (a.register.access.is_read() && b.register.access.is_read())
                    || (a.register.access.is_write() && b.register.access.is_write());
                if shared {
                    assert!(
                        a.end() <= b.address || b.end() <= a.address,
                        "{} overlaps {}",
                        a.register.name,
                        b.register.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_layout() {
        let env = ParamEnv::new().with("W", 24);
        let three_bytes = Register::new("r", Access::Read, ParamExpr::parse("W").unwrap());
        let layout = RegisterLayout::of(&three_bytes, &env, Valuation::Max).unwrap();
        assert_eq!(layout.n_bytes, 4);
        assert_eq!(layout.span(), 4);

        let array = reg("a", Access::Read, 8).log2n_items(ParamExpr::literal(2));
        let layout = RegisterLayout::of(&array, &env, Valuation::Max).unwrap();
        assert_eq!((layout.n_bytes, layout.n_items(), layout.addr_w), (1, 4, 2));

        let one_bit = reg("b", Access::Write, 1);
        assert_eq!(RegisterLayout::of(&one_bit, &env, Valuation::Max).unwrap().span(), 1);
    }

    #[test]
    fn test_layout_rejects_oversized_registers() {
        let env = ParamEnv::new();
        let big = reg("big", Access::Read, 1 << 62).log2n_items(ParamExpr::literal(32));
        assert!(matches!(
            RegisterLayout::of(&big, &env, Valuation::Max),
            Err(CsrError::Configuration(msg)) if msg.contains("big")
        ));
        assert!(matches!(
            allocate_with(table(vec![big]), &env, true, &SharedCursor),
            Err(CsrError::Configuration(_))
        ));

        let deep = reg("deep", Access::Read, 8).log2n_items(ParamExpr::literal(11));
        assert!(RegisterLayout::of(&deep, &env, Valuation::Max).is_err());
        let manual = deep.auto(false).log2n_items(ParamExpr::literal(20));
        assert_eq!(RegisterLayout::of(&manual, &env, Valuation::Max).unwrap().addr_w, 20);
    }

    #[test]
    fn test_layout_rejects_empty_width() {
        let env = ParamEnv::new().with("W", 24);
        for width in ["0", "W-30"] {
            let r = Register::new("r", Access::Write, ParamExpr::parse(width).unwrap());
            assert!(matches!(
                RegisterLayout::of(&r, &env, Valuation::Max),
                Err(CsrError::Configuration(msg)) if msg.contains("`r`")
            ));
        }
    }

    #[test]
    fn test_address_space_exhausted() {
        let env = ParamEnv::new();
        let last = (1u64 << MAX_ADDR_W) - 4;
        let fits = table(vec![reg("top", Access::Write, 32).address(last)]);
        assert_eq!(allocate_with(fits, &env, false, &SharedCursor).unwrap().core_addr_w, 32);

        for address in [1u64 << MAX_ADDR_W, u64::MAX - 3] {
            let t = table(vec![reg("over", Access::Write, 32).address(address)]);
            assert!(matches!(
                allocate_with(t, &env, false, &SharedCursor),
                Err(CsrError::Address { register, .. }) if register == "over"
            ));
        }
    }

    #[test]
    fn test_shared_cursor_unifies_directions() {
        let t = table(vec![reg("enable", Access::Write, 1), reg("status", Access::Read, 32)]);
        let resolved = allocate_with(t, &ParamEnv::new(), true, &SharedCursor).unwrap();
        assert_eq!(addresses(&resolved), [0, 4]);
        assert_eq!(resolved.core_addr_w, 3);
        assert_invariants(&resolved);
    }

    #[test]
    fn test_split_cursors_overlap_directions() {
        let t = table(vec![reg("enable", Access::Write, 1), reg("status", Access::Read, 32)]);
        let resolved = allocate_with(t, &ParamEnv::new(), true, &SplitCursors).unwrap();
        assert_eq!(addresses(&resolved), [0, 0]);
        assert_eq!(resolved.core_addr_w, 2);
        assert_invariants(&resolved);
    }

    #[test]
    fn test_auto_alignment() {
        let t = table(vec![
            reg("a", Access::Write, 8),
            reg("b", Access::Write, 16),
            reg("c", Access::Write, 1),
            reg("d", Access::Write, 64),
        ]);
        let resolved = allocate_with(t, &ParamEnv::new(), true, &SharedCursor).unwrap();
        assert_eq!(addresses(&resolved), [0, 2, 4, 8]);
        assert_eq!(resolved.core_addr_w, 4);
        assert_invariants(&resolved);
    }

    #[test]
    fn test_read_write_register_takes_both_cursors() {
        let t = table(vec![
            reg("w", Access::Write, 32),
            reg("rw", Access::ReadWrite, 8),
            reg("r", Access::Read, 8),
        ]);
        let resolved = allocate_with(t, &ParamEnv::new(), true, &SplitCursors).unwrap();
        assert_eq!(addresses(&resolved), [0, 4, 5]);
        assert_invariants(&resolved);
    }

    #[test]
    fn test_manual_addresses() {
        let t = table(vec![
            reg("a", Access::Write, 32).address(0),
            reg("b", Access::Write, 32).address(4),
        ]);
        let resolved = allocate_with(t, &ParamEnv::new(), false, &SharedCursor).unwrap();
        assert_eq!(addresses(&resolved), [0, 4]);

        let t = table(vec![
            reg("a", Access::Write, 32).address(0),
            reg("b", Access::Write, 32).address(4),
            reg("c", Access::Write, 32).address(2),
        ]);
        match allocate_with(t, &ParamEnv::new(), false, &SharedCursor) {
            Err(CsrError::Address { register, .. }) => assert_eq!(register, "c"),
            other => panic!("expected address error, got {other:?}"),
        }
    }

    #[test]
    fn test_manual_order_checked_per_direction() {
        let t = table(vec![
            reg("w", Access::Write, 32).address(8),
            reg("r", Access::Read, 32).address(0),
        ]);
        assert!(allocate_with(t.clone(), &ParamEnv::new(), false, &SplitCursors).is_ok());
        assert!(matches!(
            allocate_with(t, &ParamEnv::new(), false, &SharedCursor),
            Err(CsrError::Address { .. })
        ));
    }

    #[test]
    fn test_addressing_mode_mismatch() {
        let t = table(vec![reg("a", Access::Write, 8).address(0)]);
        assert!(matches!(
            allocate_with(t, &ParamEnv::new(), true, &SharedCursor),
            Err(CsrError::Address { .. })
        ));

        let t = table(vec![reg("a", Access::Write, 8)]);
        assert!(matches!(
            allocate_with(t, &ParamEnv::new(), false, &SharedCursor),
            Err(CsrError::Address { .. })
        ));
    }

    #[test]
    fn test_version_always_automatic() {
        let t = table(vec![
            reg("a", Access::Write, 32).address(16),
            reg("version", Access::Read, 16),
        ]);
        let resolved = allocate_with(t, &ParamEnv::new(), false, &SharedCursor).unwrap();
        assert_eq!(resolved.address_of("version"), Some(20));
        assert_eq!(resolved.core_addr_w, 5);
    }

    #[test]
    fn test_manual_rerun_is_idempotent() {
        let env = ParamEnv::new().with("N", 2);
        let t = table(vec![
            reg("ctrl", Access::Write, 1),
            reg("data", Access::Read, 8).log2n_items(ParamExpr::parse("N").unwrap()),
            reg("cfg", Access::ReadWrite, 16),
            reg("big", Access::Read, 64),
            reg("version", Access::Read, 16),
        ]);
        for policy in [&SharedCursor as &dyn OverlapPolicy, &SplitCursors] {
            let first = allocate_with(t.clone(), &env, true, policy).unwrap();
            assert_invariants(&first);
            let second = allocate_with(first.to_table(), &env, false, policy).unwrap();
            assert_eq!(addresses(&first), addresses(&second));
            assert_eq!(first.core_addr_w, second.core_addr_w);
        }
    }

    #[test]
    fn test_empty_table() {
        let t = RegisterTable { groups: vec![] };
        assert!(matches!(
            allocate_with(t, &ParamEnv::new(), true, &SharedCursor),
            Err(CsrError::Configuration(_))
        ));
    }

    #[test]
    fn test_unresolvable_width() {
        let t = table(vec![Register::new(
            "r",
            Access::Read,
            ParamExpr::parse("2*WIDTH+1").unwrap(),
        )]);
        assert!(matches!(
            allocate_with(t, &ParamEnv::new(), true, &SharedCursor),
            Err(CsrError::Expression { .. })
        ));
    }
}
