//! Conversions between `f64` and the IEEE binary128 bit layout.
//!
//! `Float128` and `Complex256` elements are stored as binary128 so that
//! buffers interoperate with extended-precision producers. Arithmetic
//! values exchange through `f64`: widening is exact, narrowing rounds to
//! nearest, ties to even.

const F64_FRAC_BITS: u32 = 52;
const F128_FRAC_BITS: u32 = 112;
const F64_BIAS: i32 = 1023;
const F128_BIAS: i32 = 16383;

/// Widen an `f64` to binary128 bits (exact).
pub fn f64_to_bits128(x: f64) -> u128 {
    let bits = x.to_bits();
    let sign = ((bits >> 63) as u128) << 127;
    let exp = ((bits >> F64_FRAC_BITS) & 0x7ff) as i32;
    let frac = bits & ((1u64 << F64_FRAC_BITS) - 1);

    if exp == 0x7ff {
        return sign | (0x7fffu128 << F128_FRAC_BITS) | ((frac as u128) << 60);
    }
    if exp == 0 {
        if frac == 0 {
            return sign;
        }
        // Subnormal: renormalise around the highest set bit.
        let top = 63 - frac.leading_zeros() as i32;
        let unbiased = top - 1074;
        let rest = (frac as u128) & ((1u128 << top) - 1);
        let frac128 = rest << (F128_FRAC_BITS as i32 - top);
        let exp128 = (unbiased + F128_BIAS) as u128;
        return sign | (exp128 << F128_FRAC_BITS) | frac128;
    }
    let exp128 = (exp - F64_BIAS + F128_BIAS) as u128;
    sign | (exp128 << F128_FRAC_BITS) | ((frac as u128) << 60)
}

/// Narrow binary128 bits to the nearest `f64` (ties to even).
pub fn bits128_to_f64(bits: u128) -> f64 {
    let sign = ((bits >> 127) as u64) << 63;
    let exp = ((bits >> F128_FRAC_BITS) & 0x7fff) as i32;
    let frac = bits & ((1u128 << F128_FRAC_BITS) - 1);

    if exp == 0x7fff {
        if frac == 0 {
            return f64::from_bits(sign | (0x7ffu64 << F64_FRAC_BITS));
        }
        let payload = ((frac >> 60) as u64) | (1u64 << 51);
        return f64::from_bits(sign | (0x7ffu64 << F64_FRAC_BITS) | payload);
    }
    if exp == 0 {
        return f64::from_bits(sign);
    }

    let unbiased = exp - F128_BIAS;
    if unbiased > F64_BIAS {
        return f64::from_bits(sign | (0x7ffu64 << F64_FRAC_BITS));
    }

    // Significand with the hidden bit, and how far to shift it down.
    let significand = (1u128 << F128_FRAC_BITS) | frac;
    let (exp_field, shift) = if unbiased >= 1 - F64_BIAS {
        ((unbiased + F64_BIAS) as u64, 60u32)
    } else {
        (0u64, 60 + (1 - F64_BIAS - unbiased) as u32)
    };
    if shift >= 128 {
        return f64::from_bits(sign);
    }

    let mut mantissa = (significand >> shift) as u64;
    let rem = significand & ((1u128 << shift) - 1);
    let half = 1u128 << (shift - 1);
    if rem > half || (rem == half && mantissa & 1 == 1) {
        mantissa += 1;
    }
    // For normal results drop the hidden bit; a carry out of the mantissa
    // bumps the exponent field, which is the correct rounding result.
    let combined = if exp_field == 0 {
        mantissa
    } else {
        (exp_field << F64_FRAC_BITS) + (mantissa - (1u64 << F64_FRAC_BITS))
    };
    if combined >= 0x7ffu64 << F64_FRAC_BITS {
        return f64::from_bits(sign | (0x7ffu64 << F64_FRAC_BITS));
    }
    f64::from_bits(sign | combined)
}
