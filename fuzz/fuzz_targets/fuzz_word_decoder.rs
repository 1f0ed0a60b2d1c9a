//! Fuzz target: `decode_words`
//!
//! Drives arbitrary byte sequences into the SCD4x word decoder and asserts
//! that it never panics, accepts only whole CRC-valid frames, and that
//! every accepted word re-encodes to the exact input bytes.
//!
//! cargo fuzz run fuzz_word_decoder

#![no_main]

use co2node::sensor::scd4x::{decode_words, encode_word};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut out = [0u16; 9];
    let words = (data.len() / 3).min(out.len());
    let out = &mut out[..words];

    if decode_words(data, out).is_ok() {
        assert_eq!(data.len(), words * 3, "decoder accepted a partial frame");
        for (chunk, word) in data.chunks_exact(3).zip(out.iter()) {
            assert_eq!(&encode_word(*word)[..], chunk, "accepted word does not re-encode");
        }
    }
});
