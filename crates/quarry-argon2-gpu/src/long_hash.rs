//! Variable-length Blake2b extension (Argon2's H′).
//!
//! Used twice on the host: expanding H0 into the first blocks of each lane,
//! and reducing the XOR of the lane tails into the output tag.

use blake2b_simd::Params;

const HALF: usize = 32;
const FULL: usize = 64;

/// Hash the concatenation of `inputs`, prefixed with `LE32(out.len())`, down
/// to exactly `out.len()` bytes.
///
/// Outputs up to 64 bytes are a single sized Blake2b digest. Longer outputs
/// chain 64-byte digests, emitting 32 bytes per link, and close with a digest
/// sized to the remainder.
pub(crate) fn blake2b_long(inputs: &[&[u8]], out: &mut [u8]) {
    let out_len = u32::try_from(out.len()).expect("output length fits in u32");

    if out.len() <= FULL {
        let mut state = Params::new().hash_length(out.len()).to_state();
        state.update(&out_len.to_le_bytes());
        for input in inputs {
            state.update(input);
        }
        out.copy_from_slice(state.finalize().as_bytes());
        return;
    }

    let mut state = Params::new().hash_length(FULL).to_state();
    state.update(&out_len.to_le_bytes());
    for input in inputs {
        state.update(input);
    }
    let mut chain = [0u8; FULL];
    chain.copy_from_slice(state.finalize().as_bytes());
    out[..HALF].copy_from_slice(&chain[..HALF]);

    // `pos` advances in half-digest steps and never reaches `out.len()`.
    let mut pos = HALF;
    while out.len().saturating_sub(pos) > FULL {
        let next = Params::new().hash_length(FULL).hash(&chain);
        chain.copy_from_slice(next.as_bytes());
        out[pos..pos.saturating_add(HALF)].copy_from_slice(&chain[..HALF]);
        pos = pos.saturating_add(HALF);
    }

    let last = Params::new()
        .hash_length(out.len().saturating_sub(pos))
        .hash(&chain);
    out[pos..].copy_from_slice(last.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_a_sized_digest_with_length_prefix() {
        let mut out = [0u8; 32];
        blake2b_long(&[b"hello", b" world"], &mut out);

        let expected = Params::new()
            .hash_length(32)
            .to_state()
            .update(&32u32.to_le_bytes())
            .update(b"hello world")
            .finalize();
        assert_eq!(&out[..], expected.as_bytes());
    }

    #[test]
    fn boundary_64_bytes_is_still_a_single_digest() {
        let mut out = [0u8; 64];
        blake2b_long(&[b"x"], &mut out);

        let expected = Params::new()
            .hash_length(64)
            .to_state()
            .update(&64u32.to_le_bytes())
            .update(b"x")
            .finalize();
        assert_eq!(&out[..], expected.as_bytes());
    }

    #[test]
    fn long_output_starts_with_half_of_the_seed_digest() {
        let mut out = vec![0u8; 1024];
        blake2b_long(&[b"seed material"], &mut out);

        let seed = Params::new()
            .hash_length(64)
            .to_state()
            .update(&1024u32.to_le_bytes())
            .update(b"seed material")
            .finalize();
        assert_eq!(&out[..32], &seed.as_bytes()[..32]);
    }

    #[test]
    fn long_outputs_of_different_lengths_diverge() {
        let mut a = vec![0u8; 72];
        let mut b = vec![0u8; 96];
        blake2b_long(&[b"same input"], &mut a);
        blake2b_long(&[b"same input"], &mut b);
        // The length prefix feeds the seed digest, so even the shared head
        // differs.
        assert_ne!(a[..32], b[..32]);
    }

    #[test]
    fn split_inputs_match_concatenated_input() {
        let mut split = [0u8; 48];
        let mut joined = [0u8; 48];
        blake2b_long(&[b"ab", b"cd", &[]], &mut split);
        blake2b_long(&[b"abcd"], &mut joined);
        assert_eq!(split, joined);
    }
}
