// https://en.wikipedia.org/wiki/Binary_GCD_algorithm
pub fn gcd(mut u: u32, mut v: u32) -> u32 {
    use std::cmp::min;
    use std::mem::swap;

    if u == 0 {
        return v;
    } else if v == 0 {
        return u;
    }

    let i = u.trailing_zeros();
    u >>= i;
    let j = v.trailing_zeros();
    v >>= j;
    let k = min(i, j);

    loop {
        if u > v {
            swap(&mut u, &mut v);
        }
        v -= u;
        if v == 0 {
            return u << k;
        }
        v >>= v.trailing_zeros();
    }
}

/// Reduce `width`:`height` to the display aspect ratio passed to the encoder.
pub fn display_aspect_ratio(width: u32, height: u32) -> (u32, u32) {
    match gcd(width, height) {
        0 => (0, 0),
        divisor => (width / divisor, height / divisor),
    }
}
