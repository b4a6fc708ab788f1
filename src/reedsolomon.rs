//! CCSDS (255,223) Reed-Solomon decoder over GF(2^8), interleave depth 4.
//!
//! Field: primitive polynomial `x^8 + x^7 + x^2 + x + 1` (0x187), generator
//! `alpha = 0x02`. Roots of the generator are `alpha^(FCR + i*PRIM)` for
//! `i` in `0..NROOTS`, the CCSDS convention of first-consecutive-root 112,
//! stride 11, rather than the textbook `alpha^1..alpha^32`.

use core::fmt;
use core::fmt::{Debug, Formatter};

/// Field size minus one; also codeword length.
pub const NN: usize = 255;
/// Message (data) symbols per codeword.
pub const KK: usize = 223;
/// Parity symbols per codeword, `2t`.
pub const NROOTS: usize = NN - KK;
/// Maximum correctable byte errors per codeword.
pub const T: usize = NROOTS / 2;
/// First consecutive root exponent.
const FCR: usize = 112;
/// Root stride.
const PRIM: usize = 11;
/// CCSDS interleave depth across one CVCDU body.
pub const INTERLEAVE_DEPTH: usize = 4;

const PRIM_POLY: u16 = 0x187;

const fn build_tables() -> ([u8; 256], [u8; 256])
{
    let mut alpha_to = [0u8; 256];
    let mut index_of = [0u8; 256];

    let mut reg: u16 = 1;
    let mut i = 0;
    while i < NN
    {
        alpha_to[i] = reg as u8;
        index_of[reg as usize] = i as u8;

        reg <<= 1;
        if reg & 0x100 != 0
        {
            reg ^= PRIM_POLY;
        }
        i += 1;
    }
    alpha_to[NN] = alpha_to[0];
    index_of[0] = NN as u8;

    (alpha_to, index_of)
}

static TABLES: ([u8; 256], [u8; 256]) = build_tables();

const fn modular_inverse(a: usize, modulus: usize) -> usize
{
    let mut e = 1;
    while e < modulus
    {
        if (a * e) % modulus == 1
        {
            return e;
        }
        e += 1;
    }
    1
}

const IPRIM: usize = modular_inverse(PRIM, NN);

#[inline]
fn gf_mul(a: u8, b: u8) -> u8
{
    if a == 0 || b == 0
    {
        return 0;
    }
    let (alpha_to, index_of) = &TABLES;
    alpha_to[(index_of[a as usize] as usize + index_of[b as usize] as usize) % NN]
}

#[inline]
fn gf_div(a: u8, b: u8) -> u8
{
    debug_assert_ne!(b, 0);
    if a == 0
    {
        return 0;
    }
    let (alpha_to, index_of) = &TABLES;
    alpha_to[(index_of[a as usize] as usize + NN - index_of[b as usize] as usize) % NN]
}

#[inline]
fn alpha_pow(exp: usize) -> u8
{
    TABLES.0[exp % NN]
}

/// Reed-Solomon decode outcome for one codeword.
#[derive(Copy, Clone)]
pub enum RsOutcome
{
    /// No errors detected.
    Clean,
    /// Corrected this many byte errors.
    Corrected(usize),
    /// Error locator degree did not match the number of roots found; the
    /// codeword is uncorrectable and was left untouched.
    Failed
}

impl Debug for RsOutcome
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Self::Clean => writeln!(f, "no errors"),
            Self::Corrected(n) => writeln!(f, "corrected {n} byte errors"),
            Self::Failed => writeln!(f, "uncorrectable")
        }
    }
}

fn compute_syndromes(data: &[u8; NN]) -> [u8; NROOTS]
{
    let mut syn = [0u8; NROOTS];

    for (i, slot) in syn.iter_mut().enumerate()
    {
        let root = alpha_pow((FCR + i * PRIM) % NN);
        let mut s = 0u8;
        let mut xpow = 1u8;

        for &c in data.iter()
        {
            if c != 0
            {
                s ^= gf_mul(c, xpow);
            }
            xpow = gf_mul(xpow, root);
        }
        *slot = s;
    }
    syn
}

/// Berlekamp-Massey: find the error locator polynomial (ascending
/// coefficients, `sigma[0] == 1`) for a syndrome sequence.
fn berlekamp_massey(syn: &[u8; NROOTS]) -> Vec<u8>
{
    let n = NROOTS;
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;

    let mut l = 0usize;
    let mut m = 1usize;
    let mut last_discrepancy = 1u8;

    for round in 0..n
    {
        let mut d = syn[round];
        for i in 1..=l
        {
            d ^= gf_mul(c[i], syn[round - i]);
        }

        if d == 0
        {
            m += 1;
        }
        else if 2 * l <= round
        {
            let t = c.clone();
            let coef = gf_div(d, last_discrepancy);
            for i in m..=n
            {
                c[i] ^= gf_mul(coef, b[i - m]);
            }
            l = round + 1 - l;
            b = t;
            last_discrepancy = d;
            m = 1;
        }
        else
        {
            let coef = gf_div(d, last_discrepancy);
            for i in m..=n
            {
                c[i] ^= gf_mul(coef, b[i - m]);
            }
            m += 1;
        }
    }

    c.truncate(l + 1);
    c
}

/// Chien search: find roots of `sigma` in the Z-domain (`Z_k = alpha^(i_k *
/// PRIM)`) and map each back to its data array position `i_k`.
fn chien_search(sigma: &[u8]) -> Option<Vec<usize>>
{
    let l = sigma.len() - 1;
    if l == 0
    {
        return Some(Vec::new());
    }

    let mut positions = Vec::with_capacity(l);

    for m in 0..NN
    {
        let zinv = alpha_pow((NN - m) % NN);

        let mut val = 0u8;
        for &coef in sigma.iter().rev()
        {
            val = gf_mul(val, zinv) ^ coef;
        }

        if val == 0
        {
            positions.push((m * IPRIM) % NN);
        }
    }

    if positions.len() == l { Some(positions) } else { None }
}

/// Error evaluator `Omega(x) = [S(x) * sigma(x)] mod x^NROOTS`.
fn error_evaluator(syn: &[u8; NROOTS], sigma: &[u8]) -> Vec<u8>
{
    let mut omega = vec![0u8; NROOTS];
    for (n, slot) in omega.iter_mut().enumerate()
    {
        let top = n.min(sigma.len() - 1);
        let mut acc = 0u8;
        for j in 0..=top
        {
            acc ^= gf_mul(sigma[j], syn[n - j]);
        }
        *slot = acc;
    }
    omega
}

fn eval_poly(poly: &[u8], x: u8) -> u8
{
    let mut acc = 0u8;
    for &coef in poly.iter().rev()
    {
        acc = gf_mul(acc, x) ^ coef;
    }
    acc
}

/// Formal derivative of `sigma` (only odd-degree terms survive over
/// `GF(2^m)`), evaluated at `x`.
fn eval_derivative(sigma: &[u8], x: u8) -> u8
{
    let mut acc = 0u8;
    let mut xpow = 1u8;
    let x2 = gf_mul(x, x);

    let mut j = 1;
    while j < sigma.len()
    {
        acc ^= gf_mul(sigma[j], xpow);
        xpow = gf_mul(xpow, x2);
        j += 2;
    }
    acc
}

/// Decode one 255-byte codeword in place (ascending coefficient order,
/// `data[j]` the coefficient of `x^j`).
pub fn decode_codeword(data: &mut [u8; NN]) -> RsOutcome
{
    let syn = compute_syndromes(data);
    if syn.iter().all(|&s| s == 0)
    {
        return RsOutcome::Clean;
    }

    let sigma = berlekamp_massey(&syn);
    let l = sigma.len() - 1;

    let Some(positions) = chien_search(&sigma)
    else
    {
        return RsOutcome::Failed;
    };

    let omega = error_evaluator(&syn, &sigma);

    for &pos in &positions
    {
        let m = (pos * PRIM) % NN;
        let zinv = alpha_pow((NN - m) % NN);

        let omega_val = eval_poly(&omega, zinv);
        let sigma_prime_val = eval_derivative(&sigma, zinv);
        if sigma_prime_val == 0
        {
            return RsOutcome::Failed;
        }

        let x_pow_b = alpha_pow((pos * FCR) % NN);
        let magnitude = gf_div(gf_div(omega_val, sigma_prime_val), x_pow_b);

        data[pos] ^= magnitude;
    }

    RsOutcome::Corrected(l)
}

/// Deinterleave a 1,020-byte CVCDU body into 4 codewords (stride 4), decode
/// each, and re-interleave corrected bytes back in place. Returns whether
/// each of the 4 codewords decoded successfully.
pub fn decode_frame(body: &mut [u8]) -> [bool; INTERLEAVE_DEPTH]
{
    assert_eq!(body.len(), INTERLEAVE_DEPTH * NN);

    let mut ok = [false; INTERLEAVE_DEPTH];

    for (c, ok_slot) in ok.iter_mut().enumerate()
    {
        let mut codeword = [0u8; NN];
        for k in 0..NN
        {
            codeword[k] = body[c + k * INTERLEAVE_DEPTH];
        }

        match decode_codeword(&mut codeword)
        {
            RsOutcome::Failed =>
            {
                log::warn!("reed-solomon: codeword {c} uncorrectable");
                *ok_slot = false;
            }
            outcome =>
            {
                if let RsOutcome::Corrected(n) = outcome
                {
                    log::debug!("reed-solomon: codeword {c} corrected {n} errors");
                }
                for k in 0..NN
                {
                    body[c + k * INTERLEAVE_DEPTH] = codeword[k];
                }
                *ok_slot = true;
            }
        }
    }

    ok
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn xorshift(state: &mut u32) -> u32
    {
        *state ^= *state << 13;
        *state ^= *state >> 17;
        *state ^= *state << 5;
        *state
    }

    #[test]
    fn zero_codeword_corrects_up_to_t_errors()
    {
        let mut state = 0xC0FF_EEu32;
        let mut codeword = [0u8; NN];

        let mut positions = Vec::new();
        while positions.len() < T
        {
            let p = (xorshift(&mut state) as usize) % NN;
            if !positions.contains(&p)
            {
                positions.push(p);
            }
        }
        for &p in &positions
        {
            codeword[p] = ((xorshift(&mut state) % 255) + 1) as u8;
        }

        match decode_codeword(&mut codeword)
        {
            RsOutcome::Corrected(n) => assert_eq!(n, T),
            other => panic!("expected correction, got {other:?}")
        }
        assert!(codeword.iter().all(|&b| b == 0));
    }

    #[test]
    fn clean_codeword_reports_clean()
    {
        let mut codeword = [0u8; NN];
        assert!(matches!(decode_codeword(&mut codeword), RsOutcome::Clean));
    }

    #[test]
    fn decode_frame_reports_per_codeword_success()
    {
        let mut body = vec![0u8; INTERLEAVE_DEPTH * NN];
        // corrupt a handful of bytes, all landing in codeword 0 (stride 4)
        for k in [0usize, 4, 8, 12]
        {
            body[k] = 0x5A;
        }

        let ok = decode_frame(&mut body);
        assert!(ok[0]);
        assert!(ok[1] && ok[2] && ok[3]);
        assert!(body.iter().all(|&b| b == 0));
    }

    #[test]
    fn alpha_table_round_trips_through_index_of()
    {
        let (alpha_to, index_of) = &TABLES;
        for v in 1..=255u16
        {
            let idx = index_of[v as usize] as usize;
            assert_eq!(alpha_to[idx] as u16, v);
        }
    }
}
