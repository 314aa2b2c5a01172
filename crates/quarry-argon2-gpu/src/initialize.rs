//! CPU-side initialization: the first two blocks of every lane.
//!
//! Argon2 starts from a 64-byte digest H0 of the cost parameters, password
//! and salt, then expands H0 into blocks (l, 0, 0) and (l, 0, 1) for each
//! lane `l`. Those blocks are the only data uploaded to the device; the
//! memory-fill kernel derives everything else from them.

use crate::encoding::SaltDescriptor;
use crate::long_hash::blake2b_long;
use crate::BLOCK_BYTES;
use blake2b_simd::Params;
use zeroize::Zeroize;

const H0_LEN: usize = 64;

/// Fill `slot` with the first two blocks of every lane for one candidate.
///
/// `slot` must be exactly `lanes * 2 * BLOCK_BYTES` bytes. Block (lane `l`,
/// index `k`) lands at byte offset `(k * lanes + l) * BLOCK_BYTES` — the
/// interleaved physical order of the device scratch buffer, which lets the
/// driver upload the whole strip with one rectangular copy.
pub fn fill_first_blocks(password: &[u8], descriptor: &SaltDescriptor, slot: &mut [u8]) {
    let lanes = descriptor.lanes as usize;
    let slot_len = lanes.saturating_mul(2).saturating_mul(BLOCK_BYTES);
    assert_eq!(slot.len(), slot_len, "staging slot size");

    let mut h0 = initial_hash(password, descriptor);
    for k in 0..2u32 {
        for l in 0..descriptor.lanes {
            let index = (k as usize).saturating_mul(lanes).saturating_add(l as usize);
            let offset = index.saturating_mul(BLOCK_BYTES);
            let block = &mut slot[offset..offset.saturating_add(BLOCK_BYTES)];
            blake2b_long(&[&h0, &k.to_le_bytes(), &l.to_le_bytes()], block);
        }
    }
    h0.zeroize();
}

/// H0: Blake2b-512 over the little-endian preamble of all inputs.
///
/// Secret and associated data are not supported, so their length prefixes
/// are fixed zero words.
fn initial_hash(password: &[u8], descriptor: &SaltDescriptor) -> [u8; H0_LEN] {
    let password_len = u32::try_from(password.len()).expect("password length fits in u32");
    let salt_len = u32::try_from(descriptor.salt().len()).expect("salt length fits in u32");

    let mut state = Params::new().hash_length(H0_LEN).to_state();
    state.update(&descriptor.lanes.to_le_bytes());
    state.update(&descriptor.hash_size.to_le_bytes());
    state.update(&descriptor.m_cost.to_le_bytes());
    state.update(&descriptor.t_cost.to_le_bytes());
    state.update(&descriptor.version.to_le_bytes());
    state.update(&descriptor.variant.kernel_index().to_le_bytes());
    state.update(&password_len.to_le_bytes());
    state.update(password);
    state.update(&salt_len.to_le_bytes());
    state.update(descriptor.salt());
    state.update(&0u32.to_le_bytes());
    state.update(&0u32.to_le_bytes());

    let mut h0 = [0u8; H0_LEN];
    h0.copy_from_slice(state.finalize().as_bytes());
    h0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode;

    const D1: &str =
        "$argon2d$v=19$m=4096,t=3,p=1$ZGFtYWdlX2RvbmU$w9w3s5/zV8+PcAZlJhnTCOE+vBkZssmZf6jOq3dKv50";
    const I3: &str = "$argon2i$v=19$m=16384,t=4,p=3$YW5vdGhlcl9zYWx0$K7unxwO5aeuZCpnIJ06FMCRKod3eRg8oIRzQrK3E6mGbyqlTvvl47jeDWq/5drF1COJkEF9Ty7FWXJZHa+vqlf2YZGp/4qSlAvKmdtJ/6JZU32iQItzMRwcfujHE+PBjbL5uz4966A";

    #[test]
    fn fills_two_blocks_per_lane_deterministically() {
        let (descriptor, _) = decode(D1).unwrap();
        let mut a = vec![0u8; 2 * BLOCK_BYTES];
        let mut b = vec![0u8; 2 * BLOCK_BYTES];
        fill_first_blocks(b"password", &descriptor, &mut a);
        fill_first_blocks(b"password", &descriptor, &mut b);
        assert_eq!(a, b);
        // Block index feeds the long hash, so the two blocks differ.
        assert_ne!(a[..BLOCK_BYTES], a[BLOCK_BYTES..]);
    }

    #[test]
    fn lane_index_separates_blocks() {
        let (descriptor, _) = decode(I3).unwrap();
        let mut slot = vec![0u8; 3 * 2 * BLOCK_BYTES];
        fill_first_blocks(b"death_dying", &descriptor, &mut slot);

        // Interleaved order: the three k=0 blocks come first, one per lane.
        let lane0 = &slot[..BLOCK_BYTES];
        let lane1 = &slot[BLOCK_BYTES..2 * BLOCK_BYTES];
        let lane2 = &slot[2 * BLOCK_BYTES..3 * BLOCK_BYTES];
        assert_ne!(lane0, lane1);
        assert_ne!(lane1, lane2);
    }

    #[test]
    fn password_and_variant_feed_h0() {
        let (d, _) = decode(D1).unwrap();
        let mut i = d;
        i.variant = crate::Variant::I;

        let h_pw_a = initial_hash(b"password", &d);
        let h_pw_b = initial_hash(b"passwore", &d);
        let h_variant = initial_hash(b"password", &i);
        assert_ne!(h_pw_a, h_pw_b);
        assert_ne!(h_pw_a, h_variant);
    }

    #[test]
    fn empty_password_is_a_valid_input() {
        let (descriptor, _) = decode(D1).unwrap();
        let mut slot = vec![0u8; 2 * BLOCK_BYTES];
        fill_first_blocks(b"", &descriptor, &mut slot);
        assert_ne!(slot[..64], [0u8; 64]);
    }
}
