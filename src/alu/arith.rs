//! Two's complement arithmetic used by the execution engine.
//!
//! All register arithmetic wraps on 32 bits. The only operation with
//! side outputs is [`compare`], which produces the full flag word.

use crate::alu::Flags;

/// Compute `lhs - rhs` and the flags it produces.
///
/// - Carry: unsigned `lhs < rhs` (a borrow out of bit 31)
/// - Zero: the difference is zero
/// - Sign: the difference is negative
/// - Overflow: a strictly negative `lhs` minus a strictly positive `rhs`
///   gave a non-negative result, or a strictly positive `lhs` minus a
///   strictly negative `rhs` gave a negative result
///
/// A zero operand never sets overflow, so `0 - i32::MIN` leaves it clear.
pub fn compare(lhs: i32, rhs: i32) -> (i32, Flags) {
    let result = lhs.wrapping_sub(rhs);

    let carry = (lhs as u32) < (rhs as u32);
    let zero = result == 0;
    let sign = result < 0;
    let overflow = if lhs < 0 && rhs > 0 {
        result >= 0
    } else if lhs > 0 && rhs < 0 {
        result < 0
    } else {
        false
    };

    (result, Flags::new(carry, zero, sign, overflow))
}

/// Logical shift right by one bit; the sign bit is not replicated.
#[inline]
pub fn shift_right_logical(value: i32) -> i32 {
    ((value as u32) >> 1) as i32
}

/// Sign-extend a 16-bit immediate to a register-width operand.
#[inline]
pub fn extend_immediate(imm: i16) -> i32 {
    i32::from(imm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_compare_equal() {
        let (result, flags) = compare(42, 42);
        assert_eq!(result, 0);
        assert!(flags.zero());
        assert!(!flags.sign());
        assert!(!flags.carry());
        assert!(!flags.overflow());
    }

    #[test]
    fn test_compare_negative_result() {
        // 3 - 5 = -2
        let (result, flags) = compare(3, 5);
        assert_eq!(result, -2);
        assert!(flags.sign());
        assert!(flags.carry());
        assert!(!flags.overflow());
        assert!(!flags.zero());
    }

    #[test]
    fn test_compare_overflow_negative_minus_positive() {
        let (result, flags) = compare(i32::MIN, 1);
        assert_eq!(result, i32::MAX);
        assert!(flags.overflow());
        assert!(!flags.sign());
    }

    #[test]
    fn test_compare_overflow_positive_minus_negative() {
        let (result, flags) = compare(i32::MAX, -1);
        assert_eq!(result, i32::MIN);
        assert!(flags.overflow());
        assert!(flags.sign());
    }

    #[test]
    fn test_compare_zero_operand_never_overflows() {
        let (result, flags) = compare(0, i32::MIN);
        assert_eq!(result, i32::MIN);
        assert!(flags.sign());
        assert!(!flags.overflow());
    }

    #[test]
    fn test_compare_unsigned_carry() {
        // -1 is 0xffffffff unsigned, which is above 1
        let (_, flags) = compare(-1, 1);
        assert!(!flags.carry());
        let (_, flags) = compare(1, -1);
        assert!(flags.carry());
    }

    #[test]
    fn test_shift_right_logical() {
        assert_eq!(shift_right_logical(8), 4);
        assert_eq!(shift_right_logical(1), 0);
        assert_eq!(shift_right_logical(-1), i32::MAX);
        assert_eq!(shift_right_logical(i32::MIN), 0x4000_0000);
    }

    #[test]
    fn test_extend_immediate() {
        assert_eq!(extend_immediate(-1), -1);
        assert_eq!(extend_immediate(i16::MIN), -32768);
        assert_eq!(extend_immediate(i16::MAX), 32767);
    }

    proptest! {
        #[test]
        fn prop_compare_only_defined_bits(a in any::<i32>(), b in any::<i32>()) {
            let (_, flags) = compare(a, b);
            prop_assert_eq!(flags.bits() & !Flags::MASK, 0);
        }

        #[test]
        fn prop_compare_signed_order(a in any::<i32>(), b in any::<i32>()) {
            let (_, flags) = compare(a, b);
            // Without the zero-operand corner, SF xor OF is signed less-than
            if a != 0 && b != 0 {
                prop_assert_eq!(flags.sign() ^ flags.overflow(), a < b);
            }
            prop_assert_eq!(flags.zero(), a == b);
            prop_assert_eq!(flags.carry(), (a as u32) < (b as u32));
        }
    }
}
