//! Integration tests chaining multiple pipeline stages through their
//! public APIs. The convolutional deinterleaver's steady-state alignment
//! only emerges across tens of thousands of symbols of continuous
//! downlink (`branches * delay` = 73,728), so these tests exercise the
//! frame/packet/image stages directly rather than fabricating a
//! byte-exact synthetic capture spanning that interleaver depth; the
//! interleaver's own permutation and resync logic is covered at unit
//! scale in `deinterleave.rs`.

use lrpt_core::consts::{ASM, SOFT_FRAME_LEN};
use lrpt_core::derandomize::PN_SEQUENCE;
use lrpt_core::frame::{FrameAssembler, PacketReassembler};
use lrpt_core::jpeg::JpegDecoder;
use lrpt_core::options::Spacecraft;
use lrpt_core::viterbi;
use lrpt_core::{DecodeError, Decoder, Image, ParamError};

/// Build a hard frame (sync word + PN-scrambled all-zero body) whose
/// Reed-Solomon codewords are the all-zero (trivially valid) codeword,
/// then convolutionally encode it into a soft frame.
fn build_clean_soft_frame() -> Vec<i8>
{
    let mut frame = vec![0u8; 1024];
    frame[..4].copy_from_slice(&ASM.to_be_bytes());
    for (k, b) in frame[4..].iter_mut().enumerate()
    {
        *b = PN_SEQUENCE[k % 255];
    }

    viterbi::encode(&frame, 8_192)
}

#[test]
fn frame_assembler_recovers_a_clean_cvcdu_body()
{
    let soft = build_clean_soft_frame();
    assert_eq!(soft.len(), SOFT_FRAME_LEN);

    // the lookahead margin requires 2 frames of input even though only
    // the first is actually decoded.
    let mut input = soft.clone();
    input.extend_from_slice(&soft);

    let mut assembler = FrameAssembler::new();
    let outcome = assembler.next_frame(&input).expect("a frame should decode");

    assert!(outcome.all_ok);
    assert_eq!(outcome.ber_percent, 0);
    assert_eq!(outcome.body.len(), 1020);
    assert!(outcome.body.iter().all(|&b| b == 0));
}

fn all_zero_mcu_payload(mcus: usize) -> Vec<u8>
{
    // DC category 0 code is `00` (2 bits); AC end-of-block code is `1010`
    // (4 bits) -- see huffman.rs's canonical code assignment.
    let mut bitstring = String::new();
    for _ in 0..mcus
    {
        bitstring.push_str("001010");
    }
    while bitstring.len() % 8 != 0
    {
        bitstring.push('0');
    }

    bitstring
        .as_bytes()
        .chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &c| (acc << 1) | u8::from(c == b'1')))
        .collect()
}

fn build_source_packet(apid: u16, mcu_id: u8, pck_cnt: u16, quality: u8, payload: &[u8]) -> Vec<u8>
{
    let mut secondary = vec![mcu_id, (pck_cnt >> 8) as u8, (pck_cnt & 0xFF) as u8, quality];
    secondary.extend_from_slice(payload);

    let mut packet = vec![0u8; 6];
    packet[0] = (apid >> 8) as u8 & 0x07;
    packet[1] = (apid & 0xFF) as u8;
    let len = (secondary.len() - 1) as u16;
    packet[4] = (len >> 8) as u8;
    packet[5] = (len & 0xFF) as u8;
    packet.extend_from_slice(&secondary);
    packet
}

#[test]
fn cvcdu_body_to_flat_image_through_packet_reassembly_and_jpeg()
{
    let payload = all_zero_mcu_payload(14);
    let packet = build_source_packet(65, 0, 14, 100, &payload);

    let mut body = vec![0u8; 1020];
    body[0] = 0;
    body[1] = 0; // first header pointer: packet starts at the zone's first byte
    body[2..2 + packet.len()].copy_from_slice(&packet);

    let mut reassembler = PacketReassembler::new();
    let packets = reassembler.feed(&body);
    assert_eq!(packets.len(), 1);

    let mut jpeg = JpegDecoder::new();
    let mut image = Image::new(Spacecraft::MeteorM2, Spacecraft::MeteorM2.image_width(), 0);

    let p = &packets[0];
    jpeg.decode_packet(&mut image, Spacecraft::MeteorM2, p.apid, p.mcu_id, p.pck_cnt, p.quality, &p.payload, 1 << 16);

    assert_eq!(image.height(), 8);
    let width = Spacecraft::MeteorM2.image_width();
    for y in 0..8
    {
        for x in 0..(14 * 8)
        {
            assert_eq!(image.get_px(65, x + y * width), 128);
        }
    }
}

#[test]
fn fourteen_packets_complete_a_flat_128_row_across_the_full_image_width()
{
    let payload = all_zero_mcu_payload(14);

    let mut jpeg = JpegDecoder::new();
    let mut image = Image::new(Spacecraft::MeteorM2, Spacecraft::MeteorM2.image_width(), 0);

    // one packet covers 14 MCUs = 112 px; 14 packets of mcu_id 0, 14, 28, ...,
    // 182 tile the full 1568 px-wide row (196 MCUs) at a single pck_cnt, so
    // none of them advance the row cursor.
    for packet_idx in 0..14u8
    {
        let mcu_id = packet_idx * 14;
        jpeg.decode_packet(&mut image, Spacecraft::MeteorM2, 65, mcu_id, 14, 100, &payload, 1 << 16);
    }

    assert_eq!(image.height(), 8);
    let width = Spacecraft::MeteorM2.image_width();
    assert_eq!(width, 196 * 8);

    for y in 0..8
    {
        for x in 0..width
        {
            assert_eq!(image.get_px(65, x + y * width), 128);
        }
    }
}

#[test]
fn decoder_rejects_input_shorter_than_one_and_a_half_frames()
{
    let mut decoder = Decoder::new(Spacecraft::MeteorM2);
    let short = vec![0i8; SOFT_FRAME_LEN];

    match decoder.exec(&short)
    {
        Err(DecodeError::Param(ParamError::TooShort(expected, found))) =>
        {
            assert_eq!(expected, 3 * SOFT_FRAME_LEN / 2);
            assert_eq!(found, SOFT_FRAME_LEN);
        }
        other => panic!("expected TooShort, got {other:?}")
    }
}

#[test]
fn fresh_decoder_reports_no_frames_and_an_empty_image()
{
    let decoder = Decoder::new(Spacecraft::MeteorM2);
    assert_eq!(decoder.frames_total(), 0);
    assert_eq!(decoder.signal_quality(), 0);

    let image = decoder.dump_image();
    assert_eq!(image.height(), 0);
    assert_eq!(image.width(), Spacecraft::MeteorM2.image_width());
}
