//! Burst-error convolutional deinterleaver with sync-word resynchronization
//! over a continuous soft-symbol stream.
//!
//! The on-board interleaver spreads each byte's bits `(branches-1) * delay`
//! symbols apart so that a burst error on the channel lands on distinct
//! bytes after deinterleaving; a repeating 8-symbol sync byte marks the
//! start of every 80-symbol block so the receiver can find the phase of
//! that spreading without any other side channel.

use crate::error::DataProcError;

/// Interleaver branch count.
pub const BRANCHES: usize = 36;
/// Interleaver delay, in symbols, between adjacent branches.
pub const DELAY: usize = 2048;
/// `BRANCHES * DELAY`.
pub const BASE_LEN: usize = BRANCHES * DELAY;
/// Payload bits carried per sync-delimited block.
pub const PAYLOAD_BITS: usize = 72;
/// Sync marker width, in symbols.
pub const SYNC_BITS: usize = 8;
/// Total symbols per block (sync + payload).
pub const BLOCK_PERIOD: usize = PAYLOAD_BITS + SYNC_BITS;

/// Threshold 8 consecutive soft symbols into a byte: negative -> 0,
/// non-negative -> 1, first symbol in the least-significant bit.
fn sign_byte(symbols: &[i8]) -> u8
{
    let mut b = 0u8;
    for (k, &s) in symbols.iter().enumerate().take(8)
    {
        if s >= 0
        {
            b |= 1 << k;
        }
    }
    b
}

fn byte_at(data: &[i8], pos: usize) -> Option<u8>
{
    data.get(pos..pos + 8).map(sign_byte)
}

/// Search `data` for the first position where a thresholded sync byte
/// repeats at four consecutive block-period offsets.
fn find_sync(data: &[i8]) -> Option<(usize, u8)>
{
    let span = BLOCK_PERIOD;

    for i in 0..span
    {
        let Some(b0) = byte_at(data, i) else { continue };

        let matches = (1..=4).all(|k| byte_at(data, i + k * BLOCK_PERIOD) == Some(b0));

        if matches
        {
            return Some((i, b0));
        }
    }
    None
}

/// Strip sync bytes from `data`, copying out payload bits across however
/// many sync-delimited runs it takes to exhaust the buffer: a run that
/// loses sync partway through does not abandon the rest of the stream, it
/// slides the search window forward by `(DELAY - 1) * BLOCK_PERIOD` and
/// tries to reacquire. Returns the concatenated payload and the number of
/// raw symbols of `data` actually consumed by runs that contributed to it.
fn sync_strip(data: &[i8]) -> Result<(Vec<i8>, usize), DataProcError>
{
    let mut payload = Vec::new();
    let mut search_base = 0usize;
    let mut consumed = 0usize;

    while search_base + BLOCK_PERIOD < data.len()
    {
        let Some((rel_off, sync_val)) = find_sync(&data[search_base..])
        else
        {
            log::debug!("deinterleave: sync search exhausted at base {search_base}, sliding");
            search_base += (DELAY - 1) * BLOCK_PERIOD;
            continue;
        };

        let start = search_base + rel_off;
        let mut pos = start;

        while pos + BLOCK_PERIOD <= data.len()
        {
            match byte_at(data, pos)
            {
                Some(b) if b == sync_val =>
                {
                    payload.extend_from_slice(&data[pos + SYNC_BITS..pos + SYNC_BITS + PAYLOAD_BITS]);
                    pos += BLOCK_PERIOD;
                }
                _ => break
            }
        }

        if pos > start
        {
            consumed = pos;
            log::debug!("deinterleave: locked at offset {start}, recovered {} payload symbols so far", payload.len());
        }
        else
        {
            log::debug!("deinterleave: sync lost immediately at {start}, sliding to resync");
        }

        search_base = pos + (DELAY - 1) * BLOCK_PERIOD;
    }

    if payload.is_empty()
    {
        return Err(DataProcError::ResyncFailed);
    }

    Ok((payload, consumed))
}

/// Destination index for source index `i` under the convolutional
/// deinterleaver permutation with the given branch count and delay.
/// Returns a value that may fall outside `0..len`; callers drop those.
fn dest_index(i: usize, branches: usize, delay: usize) -> i64
{
    let base_len = (branches * delay) as i64;
    let branches = branches as i64;
    let delay = delay as i64;

    i as i64 + (branches - 1) * delay - (i as i64 % branches) * base_len + (branches / 2) * base_len
}

/// Apply the convolutional deinterleaver permutation to `src`, parameterized
/// over branch count and delay (used directly with [`BRANCHES`]/[`DELAY`]
/// for the real pipeline, and with smaller values in tests).
fn conv_deinterleave_with(src: &[i8], branches: usize, delay: usize) -> Vec<i8>
{
    let n = src.len();
    let mut dst = vec![0i8; n];

    for (i, &sym) in src.iter().enumerate()
    {
        let j = dest_index(i, branches, delay);
        if j >= 0 && (j as usize) < n
        {
            dst[j as usize] = sym;
        }
    }
    dst
}

/// Undo the on-board convolutional interleaver (branches=36, delay=2048).
#[must_use]
pub fn conv_deinterleave(src: &[i8]) -> Vec<i8>
{
    conv_deinterleave_with(src, BRANCHES, DELAY)
}

/// Locate the sync marker in a continuous soft-symbol stream, strip it, and
/// undo the convolutional interleaver, returning the recovered payload
/// stream alongside the number of raw symbols of `data` that contributed
/// to it (for the caller to know how much of its input is safe to retire).
pub fn deinterleave(data: &[i8]) -> Result<(Vec<i8>, usize), DataProcError>
{
    if data.is_empty()
    {
        return Err(DataProcError::StreamTooShort);
    }

    let (payload, raw_consumed) = sync_strip(data)?;
    Ok((conv_deinterleave(&payload), raw_consumed))
}
