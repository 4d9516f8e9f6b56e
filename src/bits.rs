//! Raw bit helpers for PAC registers
//!
//! Most fields are driven through their typed accessors. Registers whose
//! fields are indexed by pin, channel or stream number are composed here
//! from a mask and offset instead.

#![allow(unused_macros)]

/// Set `mask` in a read-write register
macro_rules! set_bits {
    ($reg:expr, $mask:expr) => {{
        let mask: u32 = $mask;
        #[allow(unused_unsafe)]
        $reg.modify(|r, w| unsafe { w.bits(r.bits() | mask) });
    }};
}

/// Clear `mask` in a read-write register
macro_rules! clear_bits {
    ($reg:expr, $mask:expr) => {{
        let mask: u32 = $mask;
        #[allow(unused_unsafe)]
        $reg.modify(|r, w| unsafe { w.bits(r.bits() & !mask) });
    }};
}

/// Replace the `width` bit field at `offset` with `value`
macro_rules! write_field {
    ($reg:expr, $offset:expr, $width:expr, $value:expr) => {{
        let offset = $offset as u32;
        let mask = $crate::bits::mask($width as u32);
        let value = ($value as u32) & mask;
        #[allow(unused_unsafe)]
        $reg.modify(|r, w| unsafe { w.bits((r.bits() & !(mask << offset)) | (value << offset)) });
    }};
}

/// Overwrite a whole register
macro_rules! write_bits {
    ($reg:expr, $value:expr) => {{
        let value: u32 = $value;
        #[allow(unused_unsafe)]
        $reg.write(|w| unsafe { w.bits(value) });
    }};
}

/// Low `width` bits set
pub(crate) const fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// The `width` bit field of `bits` at `offset`
pub(crate) const fn field(bits: u32, offset: u32, width: u32) -> u32 {
    (bits >> offset) & mask(width)
}
