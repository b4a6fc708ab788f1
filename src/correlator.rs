//! Locate the CCSDS attached sync marker across the eight phase/conjugation
//! hypotheses of the Viterbi-encoded pattern.

use crate::consts::ASM_ENCODED;

/// Number of bits in the encoded sync pattern.
const PATTERN_BITS: usize = 64;

/// Number of phase/conjugation hypotheses searched in parallel.
pub const NUM_PATTERNS: usize = 8;

/// Early-exit correlation threshold: once a pattern's running score exceeds
/// this, `correlate` returns immediately. Tuned empirically against the
/// downlink, preserved bit-exact.
pub const CORR_LIMIT: u32 = 55;

/// Minimum correlation accepted by the frame assembler's fallback path
/// before it gives up on this block and slides forward instead of
/// re-stitching the alignment.
pub const CORRELATION_MIN: u32 = 45;

/// Rotate a byte of 4 QPSK symbols by swapping I/Q bit pairs (shift 1 or 3).
const fn rotate_swap(b: u8) -> u8
{
    (((b & 0x55) ^ 0x55) << 1) | ((b & 0xAA) >> 1)
}

/// Rotate a byte of 4 QPSK symbols by inverting all bits (shift 2 or 3).
const fn rotate_invert(b: u8) -> u8
{
    b ^ 0xFF
}

/// IQ-inversion: swap I/Q bit pairs without the XOR.
const fn iq_invert(b: u8) -> u8
{
    ((b & 0x55) << 1) | ((b & 0xAA) >> 1)
}

/// Apply one of the four quadrant rotations (0..3) to a byte.
const fn rotate(b: u8, shift: u8) -> u8
{
    match shift
    {
        0 => b,
        1 => rotate_swap(b),
        2 => rotate_invert(b),
        3 => rotate_invert(rotate_swap(b)),
        _ => unreachable!()
    }
}

/// Bit-expand a 64-bit pattern into 64 bytes of 0xFF/0x00, one per bit,
/// MSB-first.
fn expand_bits(pattern: u64) -> [u8; PATTERN_BITS]
{
    let mut out = [0u8; PATTERN_BITS];
    for (i, slot) in out.iter_mut().enumerate()
    {
        let bit = (pattern >> (63 - i)) & 1;
        *slot = if bit == 1 { 0xFF } else { 0x00 };
    }
    out
}

/// Apply a rotation to a 64-bit pattern by rotating each constituent byte
/// (the pattern is conceptually 8 bytes of 4 QPSK symbols each).
fn rotate_pattern(pattern: u64, shift: u8, invert_first: bool) -> u64
{
    let bytes = pattern.to_be_bytes();
    let mut out = [0u8; 8];

    for (i, &b) in bytes.iter().enumerate()
    {
        let b = if invert_first { iq_invert(b) } else { b };
        out[i] = rotate(b, shift);
    }
    u64::from_be_bytes(out)
}

/// Column-major pattern table: `patterns[bit_index][pattern_id]`, each
/// entry 0xFF or 0x00.
fn build_patterns() -> [[u8; NUM_PATTERNS]; PATTERN_BITS]
{
    let mut expanded = [[0u8; PATTERN_BITS]; NUM_PATTERNS];

    for shift in 0..4u8
    {
        expanded[shift as usize] = expand_bits(rotate_pattern(ASM_ENCODED, shift, false));
        expanded[4 + shift as usize] = expand_bits(rotate_pattern(ASM_ENCODED, shift, true));
    }

    let mut patterns = [[0u8; NUM_PATTERNS]; PATTERN_BITS];
    for bit in 0..PATTERN_BITS
    {
        for p in 0..NUM_PATTERNS
        {
            patterns[bit][p] = expanded[p][bit];
        }
    }
    patterns
}

/// Sign-agreement lookup: `corr_tab[d][p] == 1` iff the soft byte `d`
/// (interpreted as unsigned, with the MSB acting as sign) agrees with the
/// expected bit-expansion `p` (0xFF or 0x00).
fn build_corr_tab() -> Box<[[u8; 256]; 256]>
{
    let mut tab = Box::new([[0u8; 256]; 256]);

    for d in 0..256usize
    {
        for p in 0..256usize
        {
            let agree = (d > 127 && p == 0x00) || (d <= 127 && p == 0xFF);
            tab[d][p] = u8::from(agree);
        }
    }
    tab
}

/// Correlation result for one of the eight patterns.
#[derive(Copy, Clone, Debug, Default)]
pub struct PatternScore
{
    /// Best running correlation value seen for this pattern.
    pub correlation: u32,
    /// Byte offset into the search buffer where that best score occurred.
    pub position:    usize
}

/// Searches a soft-symbol buffer for the CCSDS sync marker under all eight
/// phase/conjugation hypotheses.
pub struct Correlator
{
    patterns: [[u8; NUM_PATTERNS]; PATTERN_BITS],
    corr_tab: Box<[[u8; 256]; 256]>
}

/// Outcome of a `correlate` call.
#[derive(Copy, Clone, Debug)]
pub struct CorrelateResult
{
    /// The winning pattern id, 0..8.
    pub pattern: u8,
    /// Best-match byte offset for the winning pattern.
    pub position: usize,
    /// Correlation score of the winning pattern.
    pub correlation: u32
}

impl Correlator
{
    /// Build the correlator's constant lookup tables.
    #[must_use]
    pub fn new() -> Correlator
    {
        Correlator { patterns: build_patterns(), corr_tab: build_corr_tab() }
    }

    /// Search `data[..len]` for the best-matching pattern.
    ///
    /// Returns `None` only if `len` is smaller than one pattern width.
    pub fn correlate(&self, data: &[u8], len: usize) -> Option<CorrelateResult>
    {
        if len < PATTERN_BITS
        {
            return None;
        }

        let mut scores = [PatternScore::default(); NUM_PATTERNS];

        for i in 0..=(len - PATTERN_BITS)
        {
            let mut tmp = [0u32; NUM_PATTERNS];

            for j in 0..PATTERN_BITS
            {
                let d = data[i + j] as usize;

                for p in 0..NUM_PATTERNS
                {
                    tmp[p] += u32::from(self.corr_tab[d][self.patterns[j][p] as usize]);
                }
            }

            for p in 0..NUM_PATTERNS
            {
                if tmp[p] > scores[p].correlation
                {
                    scores[p].correlation = tmp[p];
                    scores[p].position = i;

                    if scores[p].correlation > CORR_LIMIT
                    {
                        return Some(CorrelateResult {
                            pattern: p as u8,
                            position: scores[p].position,
                            correlation: scores[p].correlation
                        });
                    }
                }
            }
        }

        let (best_p, best) = scores
            .iter()
            .enumerate()
            .max_by_key(|(idx, s)| (s.correlation, -(*idx as i64)))
            .expect("scores is non-empty");

        Some(CorrelateResult { pattern: best_p as u8, position: best.position, correlation: best.correlation })
    }
}

impl Default for Correlator
{
    fn default() -> Self
    {
        Self::new()
    }
}
