// Licensed under the Apache-2.0 license

//! Utility functions for address arithmetic and text formatting.
//!
//! The address helpers work on byte addresses and power-of-two block sizes
//! given as their base-2 logarithm, which is how register spans are
//! expressed throughout the compiler.

/// Returns `ceil(log2(n))`, with `ceil_log2(0) == ceil_log2(1) == 0`.
///
/// # Examples
/// ```
/// use csr_compiler::util::ceil_log2;
/// assert_eq!(ceil_log2(1), 0);
/// assert_eq!(ceil_log2(4), 2);
/// assert_eq!(ceil_log2(5), 3);
/// ```
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        64 - (n - 1).leading_zeros()
    }
}

/// Rounds `n` up to the next multiple of `2^log2base`, or `None` when the
/// result does not fit in a `u64`.
///
/// # Examples
/// ```
/// use csr_compiler::util::bceil;
/// assert_eq!(bceil(5, 2), Some(8));
/// assert_eq!(bceil(8, 2), Some(8));
/// assert_eq!(bceil(0, 3), Some(0));
/// assert_eq!(bceil(u64::MAX, 4), None);
/// ```
pub fn bceil(n: u64, log2base: u32) -> Option<u64> {
    let base = 1u64.checked_shl(log2base)?;
    n.div_ceil(base).checked_mul(base)
}

/// Rounds `n` down to a multiple of `2^log2base`.
///
/// # Examples
/// ```
/// use csr_compiler::util::bfloor;
/// assert_eq!(bfloor(7, 2), 4);
/// assert_eq!(bfloor(8, 2), 8);
/// ```
pub fn bfloor(n: u64, log2base: u32) -> u64 {
    n & !((1u64 << log2base) - 1)
}

/// Bit offset of byte address `n` inside a bus word of `n_bytes` bytes.
///
/// # Examples
/// ```
/// use csr_compiler::util::boffset;
/// assert_eq!(boffset(0, 4), 0);
/// assert_eq!(boffset(6, 4), 16);
/// ```
pub fn boffset(n: u64, n_bytes: u64) -> u64 {
    8 * (n % n_bytes)
}

/// Verilog expression for the larger of two widths.
///
/// Numeric operands are folded; symbolic ones produce a conditional
/// expression that the synthesis tool evaluates.
///
/// # Examples
/// ```
/// use csr_compiler::util::verilog_max;
/// assert_eq!(verilog_max("8", "1"), "8");
/// assert_eq!(verilog_max("DATA_W", "1"), "((DATA_W > 1) ? DATA_W : 1)");
/// ```
pub fn verilog_max(a: &str, b: &str) -> String {
    if a == b {
        return a.to_string();
    }
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.max(y).to_string(),
        _ => format!("(({a} > {b}) ? {a} : {b})"),
    }
}

/// Upper-case macro prefix for a module name, e.g. `iob_timer` -> `IOB_TIMER_`.
pub fn macro_prefix(top: &str) -> String {
    format!("{}_", top.to_uppercase())
}

/// Escapes the characters TeX treats specially inside table cells.
///
/// # Examples
/// ```
/// use csr_compiler::util::tex_escape;
/// assert_eq!(tex_escape("rx_data & 50%"), "rx\\_data \\& 50\\%");
/// ```
pub fn tex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '_' | '&' | '%' | '$' | '#' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
