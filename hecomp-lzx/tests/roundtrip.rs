//! Round-trip tests for the LZX codec across window sizes and data shapes.

use hecomp_lzx::{
    FRAME_SIZE, FrameReader, LzxDecoder, LzxEncoder, MAX_WINDOW_BITS, MIN_WINDOW_BITS,
    decode_framed, encode_framed,
};

fn lcg_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 56) as u8
        })
        .collect()
}

/// Random words from a small vocabulary: compressible, but not trivially.
fn text_like(len: usize, seed: u64) -> Vec<u8> {
    const WORDS: [&[u8]; 8] = [
        b"asset ", b"texture ", b"mesh ", b"level ", b"sound ", b"xbox ", b"pack ", b"\n",
    ];
    let picks = lcg_bytes(len, seed);
    let mut out = Vec::with_capacity(len + 16);
    let mut i = 0;
    while out.len() < len {
        out.extend_from_slice(WORDS[(picks[i % picks.len()] & 7) as usize]);
        i += 1;
    }
    out.truncate(len);
    out
}

fn roundtrip(data: &[u8], window_bits: u32) {
    let framed = encode_framed(data, window_bits).expect("encode failed");
    let mut output = Vec::new();
    decode_framed(&framed, window_bits, 0, data.len(), &mut output).expect("decode failed");
    assert_eq!(output.len(), data.len());
    assert!(output == data, "mismatch for {} bytes", data.len());
}

#[test]
fn test_every_window_size() {
    let data = text_like(3 * FRAME_SIZE + 123, 1);
    for bits in MIN_WINDOW_BITS..=MAX_WINDOW_BITS {
        roundtrip(&data, bits);
    }
}

#[test]
fn test_sizes_around_frame_boundaries() {
    for size in [
        1,
        2,
        3,
        10,
        11,
        FRAME_SIZE - 1,
        FRAME_SIZE,
        FRAME_SIZE + 1,
        2 * FRAME_SIZE,
    ] {
        roundtrip(&text_like(size, size as u64), 17);
    }
}

#[test]
fn test_incompressible_data() {
    roundtrip(&lcg_bytes(2 * FRAME_SIZE + 500, 42), 17);
}

#[test]
fn test_mixed_frames() {
    // Alternate stored and verbatim frames so register state crosses both
    let mut data = lcg_bytes(FRAME_SIZE, 5);
    data.extend(text_like(FRAME_SIZE, 6));
    data.extend(lcg_bytes(FRAME_SIZE, 7));
    data.extend(text_like(1000, 8));
    roundtrip(&data, 16);
}

#[test]
fn test_long_stream_trims_history() {
    // More than twice the smallest window
    let data = text_like(6 * FRAME_SIZE, 9);
    roundtrip(&data, 15);
}

#[test]
fn test_frame_reader_sees_every_chunk() {
    let data = text_like(FRAME_SIZE * 2 + 10, 11);
    let framed = encode_framed(&data, 17).unwrap();
    let frames: Vec<&[u8]> = FrameReader::new(&framed).collect();
    assert_eq!(frames.len(), 3);

    let mut decoder = LzxDecoder::new(17).unwrap();
    let mut output = Vec::new();
    for (i, chunk) in frames.iter().enumerate() {
        let frame_len = if i == 2 { 10 } else { FRAME_SIZE };
        output.extend(decoder.decompress_frame(chunk, frame_len).unwrap());
    }
    assert_eq!(output, data);
}

#[test]
fn test_corrupted_chunk_fails_cleanly() {
    let data = text_like(FRAME_SIZE, 13);
    let mut encoder = LzxEncoder::new(17).unwrap();
    let mut chunk = encoder.compress_frame(&data).unwrap();
    for byte in chunk.iter_mut().skip(8).step_by(3) {
        *byte ^= 0x5A;
    }

    let mut decoder = LzxDecoder::new(17).unwrap();
    if let Ok(out) = decoder.decompress_frame(&chunk, FRAME_SIZE) {
        assert_ne!(out, data);
    }
}
