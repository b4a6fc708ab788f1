//! Receive-side baseband decoder for Meteor-M2 LRPT downlinks.
//!
//! Orchestrates the full pipeline: deinterleave the raw soft-symbol
//! stream, undo differential QPSK encoding, then loop frame assembly
//! (correlator lock, Viterbi decode, derandomize, Reed-Solomon correction)
//! and M-PDU packet reassembly, painting decoded JPEG-like MCUs into a
//! per-APID raster image.
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod bitreader;
pub mod consts;
pub mod correlator;
pub mod deinterleave;
pub mod derandomize;
pub mod diff;
pub mod error;
pub mod frame;
pub mod huffman;
pub mod image;
pub mod jpeg;
pub mod options;
pub mod reedsolomon;
pub mod viterbi;

pub use consts::{HARD_FRAME_LEN, SOFT_FRAME_LEN};
pub use error::{DataProcError, DecodeError, ParamError};
pub use image::Image;
pub use options::{DecoderOptions, Spacecraft};

use diff::DiffDecoder;
use frame::{FrameAssembler, PacketReassembler};
use jpeg::JpegDecoder;

/// Minimum soft-symbol input `exec` requires, in units of `SOFT_FRAME_LEN`.
const MIN_EXEC_SYMBOLS: usize = 3 * SOFT_FRAME_LEN / 2;

/// Stateful LRPT decoder: feed it successive chunks of QPSK soft symbols
/// via [`Self::exec`], then snapshot the reconstructed image with
/// [`Self::dump_image`].
pub struct Decoder
{
    options:        DecoderOptions,
    diff:           DiffDecoder,
    frame:          FrameAssembler,
    reassembler:    PacketReassembler,
    jpeg:           JpegDecoder,
    image:          Image,
    framing_ok:     bool,
    frames_total:   u64,
    frames_ok:      u64,
    cvcdu_count:    u64,
    packets_count:  u64,
    signal_quality: u32
}

impl Decoder
{
    /// Build a decoder for `spacecraft` with default options.
    #[must_use]
    pub fn new(spacecraft: Spacecraft) -> Decoder
    {
        Self::with_options(spacecraft, DecoderOptions::new().set_spacecraft(spacecraft))
    }

    /// Build a decoder for `spacecraft` with explicit `options`.
    #[must_use]
    pub fn with_options(spacecraft: Spacecraft, options: DecoderOptions) -> Decoder
    {
        Decoder {
            options,
            diff: DiffDecoder::new(),
            frame: FrameAssembler::new(),
            reassembler: PacketReassembler::new(),
            jpeg: JpegDecoder::new(),
            image: Image::new(spacecraft, spacecraft.image_width(), 0),
            framing_ok: false,
            frames_total: 0,
            frames_ok: 0,
            cvcdu_count: 0,
            packets_count: 0,
            signal_quality: 0
        }
    }

    /// Process one chunk of QPSK soft symbols: deinterleave, undo
    /// differential encoding, then decode every complete soft frame the
    /// chunk contains. Returns the number of soft symbols consumed.
    ///
    /// # Errors
    /// Returns [`ParamError::TooShort`] if `qpsk_soft` is smaller than
    /// `3 * SOFT_FRAME_LEN / 2`, or a [`DataProcError`] if the deinterleaver
    /// cannot resynchronize at all within this chunk. A single bad frame
    /// within an otherwise-good chunk does not fail the call: it only
    /// clears `framing_ok` for that frame and the stream continues.
    pub fn exec(&mut self, qpsk_soft: &[i8]) -> Result<usize, DecodeError>
    {
        if qpsk_soft.is_empty()
        {
            return Err(ParamError::Empty.into());
        }
        if qpsk_soft.len() < MIN_EXEC_SYMBOLS
        {
            return Err(ParamError::TooShort(MIN_EXEC_SYMBOLS, qpsk_soft.len()).into());
        }

        let (mut payload, raw_consumed) = deinterleave::deinterleave(qpsk_soft)?;
        self.diff.decode(&mut payload);

        self.frame.rewind();
        let spacecraft = self.options.get_spacecraft();
        let max_height = self.options.get_max_image_height();

        while let Some(outcome) = self.frame.next_frame(&payload)
        {
            self.frames_total += 1;
            self.framing_ok = outcome.all_ok;
            self.signal_quality = 100u32.saturating_sub(outcome.ber_percent);

            if !outcome.all_ok
            {
                if self.options.get_strict_mode()
                {
                    return Err(DecodeError::DataProc(DataProcError::ReedSolomonFailed));
                }
                log::warn!("decoder: frame {} had uncorrectable interleaves, skipped", self.frames_total);
                continue;
            }

            self.frames_ok += 1;
            self.cvcdu_count += 1;

            let packets = self.reassembler.feed(&outcome.body);
            self.packets_count += packets.len() as u64;

            for packet in packets
            {
                let (lo, hi) = spacecraft.apid_range();
                if packet.apid < lo || packet.apid > hi
                {
                    log::debug!("decoder: apid {} outside imagery range, ignored", packet.apid);
                    continue;
                }

                self.jpeg.decode_packet(
                    &mut self.image,
                    spacecraft,
                    packet.apid,
                    packet.mcu_id,
                    packet.pck_cnt,
                    packet.quality,
                    &packet.payload,
                    max_height
                );
            }
        }

        // `payload` is the post-deinterleave stream the frame loop walked
        // sequentially; `raw_consumed` is how far C2 got into `qpsk_soft`
        // to produce it. Scale the frame loop's progress through `payload`
        // back onto that raw span, so a caller advancing its read cursor by
        // the returned amount does not skip the soft frames this call
        // never reached.
        debug_assert!(!payload.is_empty());
        let consumed = (raw_consumed as u128 * self.frame.position() as u128 / payload.len() as u128) as usize;

        Ok(consumed.min(qpsk_soft.len()))
    }

    /// Snapshot the current per-APID image planes.
    #[must_use]
    pub fn dump_image(&self) -> Image
    {
        self.image.clone()
    }

    /// Whether the most recently processed soft frame decoded and
    /// corrected cleanly.
    #[must_use]
    pub const fn framing_ok(&self) -> bool
    {
        self.framing_ok
    }

    /// Total soft frames processed so far.
    #[must_use]
    pub const fn frames_total(&self) -> u64
    {
        self.frames_total
    }

    /// Soft frames that decoded and corrected cleanly.
    #[must_use]
    pub const fn frames_ok(&self) -> u64
    {
        self.frames_ok
    }

    /// CVCDUs (clean frame bodies) handed to the packet reassembler.
    #[must_use]
    pub const fn cvcdu_count(&self) -> u64
    {
        self.cvcdu_count
    }

    /// Source packets reassembled so far.
    #[must_use]
    pub const fn packets_count(&self) -> u64
    {
        self.packets_count
    }

    /// Most recent signal quality estimate, `100 - viterbi_ber_percent`.
    #[must_use]
    pub const fn signal_quality(&self) -> u32
    {
        self.signal_quality
    }
}
