//! Error taxonomy for the decode pipeline.
//!
//! Mirrors the shape of the reference JPEG decoder's error enums: a plain
//! enum with a hand written [`Debug`] impl, no `std::error::Error`, no
//! derive macros pulled in just for this.
use core::fmt;
use core::fmt::{Debug, Formatter};

/// Parameter / shape errors, surfaced directly to the caller.
pub enum ParamError
{
    /// `qpsk_soft` did not contain enough samples for one `exec` call.
    TooShort(usize, usize),
    /// An APID outside the per-spacecraft image channel range was requested.
    BadApid(u16),
    /// Zero-length input where at least one sample was required.
    Empty
}

impl Debug for ParamError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Self::TooShort(expected, found) =>
            {
                writeln!(
                    f,
                    "expected at least {expected} soft symbols, got {found}"
                )
            }
            Self::BadApid(apid) => writeln!(f, "apid {apid} is outside the imagery channel range"),
            Self::Empty => writeln!(f, "input buffer is empty")
        }
    }
}

/// Stream-processing errors: recoverable at frame granularity, never at the
/// symbol level.
pub enum DataProcError
{
    /// The deinterleaver could not find a repeating sync byte inside its
    /// search margin.
    ResyncFailed,
    /// Fewer soft symbols remain than the deinterleaver's search margin
    /// requires.
    StreamTooShort,
    /// Every codeword of a CVCDU's Reed-Solomon interleave failed to
    /// correct.
    ReedSolomonFailed,
    /// The Viterbi decoder's internal re-encode did not reproduce the
    /// expected frame length (corrupt frame, not a bug in the trellis).
    ViterbiMismatch
}

impl Debug for DataProcError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Self::ResyncFailed => writeln!(f, "could not resynchronize to the sync word"),
            Self::StreamTooShort => writeln!(f, "stream too short to search for resync"),
            Self::ReedSolomonFailed => writeln!(f, "reed-solomon decode failed on one or more interleaves"),
            Self::ViterbiMismatch => writeln!(f, "viterbi re-encode did not match the decoded frame length")
        }
    }
}

/// Top level error returned by the public decoder API.
pub enum DecodeError
{
    /// A fallible allocation (image growth, buffer resize) did not succeed.
    Alloc,
    /// See [`ParamError`].
    Param(ParamError),
    /// See [`DataProcError`].
    DataProc(DataProcError),
    /// Ran out of input before a full operation could be serviced.
    Eof
}

impl Debug for DecodeError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        match self
        {
            Self::Alloc => writeln!(f, "allocation failure"),
            Self::Param(e) => writeln!(f, "{e:?}"),
            Self::DataProc(e) => writeln!(f, "{e:?}"),
            Self::Eof => writeln!(f, "unexpected end of input")
        }
    }
}

impl From<ParamError> for DecodeError
{
    fn from(value: ParamError) -> Self
    {
        Self::Param(value)
    }
}

impl From<DataProcError> for DecodeError
{
    fn from(value: DataProcError) -> Self
    {
        Self::DataProc(value)
    }
}
