#![no_main]
use allstar::codec::{deserialize_words, serialize};
use allstar::options::DeserializationOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The first byte picks the options, the rest are little-endian words.
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let options = DeserializationOptions {
        verify_atn: flags & 1 == 0,
        generate_rule_bypass_transitions: flags & 2 != 0,
    };
    let words: Vec<u16> = rest
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    // Malformed input must be rejected with an error, never a panic. A
    // verified ATN must survive another round trip.
    if let Ok(atn) = deserialize_words(&words, &options) {
        if options.verify_atn && !options.generate_rule_bypass_transitions {
            let again = allstar::codec::deserialize(&serialize(&atn), &options);
            assert!(again.is_ok());
        }
    }
});
