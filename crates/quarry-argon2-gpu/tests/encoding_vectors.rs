#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Decoder acceptance vectors, cross-checked against the CPU reference
//! implementation from the `argon2` crate.
//!
//! These run without a device: they prove that a decoded target carries
//! exactly the parameters and tag bytes that make the reference hash of the
//! right password compare equal through the fixed-size tag cells.

use quarry_argon2_gpu::{decode, is_valid, EngineError, SaltDescriptor, Variant};

/// (encoded target, cracking password) pairs the engine must accept.
const VECTORS: &[(&str, &str)] = &[
    (
        "$argon2d$v=19$m=4096,t=3,p=1$ZGFtYWdlX2RvbmU$w9w3s5/zV8+PcAZlJhnTCOE+vBkZssmZf6jOq3dKv50",
        "password",
    ),
    (
        "$argon2i$v=19$m=4096,t=3,p=1$ZGFtYWdlX2RvbmU$N59QwnpxDQZRj1/cO6bqm408dD6Z2Z9LKYpwFJSPVKA",
        "password",
    ),
    (
        "$argon2d$v=19$m=16384,t=3,p=1$c2hvcnRfc2FsdA$TLSTPihIo+5F67Y1vJdfWdB9",
        "blessed_dead",
    ),
    (
        "$argon2i$v=19$m=16384,t=4,p=3$YW5vdGhlcl9zYWx0$K7unxwO5aeuZCpnIJ06FMCRKod3eRg8oIRzQrK3E6mGbyqlTvvl47jeDWq/5drF1COJkEF9Ty7FWXJZHa+vqlf2YZGp/4qSlAvKmdtJ/6JZU32iQItzMRwcfujHE+PBjbL5uz4966A",
        "death_dying",
    ),
    (
        "$argon2id$v=19$m=4096,t=3,p=1$c2hvcmF0X3NhbHQ$K6/V3qNPJwVmLb/ELiD8gKGskLaFv5OweJYwSKUW1hE",
        "password",
    ),
    (
        "$argon2id$v=19$m=16384,t=4,p=3$c2hvcmF0X3NhbHQ$hG83oaWEcftTjbiWJxoQs6gKCModwYAC+9EK8j/DUsk",
        "sacrificed",
    ),
];

/// Trusted CPU implementation of the same tag.
fn reference_tag(password: &[u8], descriptor: &SaltDescriptor) -> Vec<u8> {
    let algorithm = match descriptor.variant {
        Variant::D => argon2::Algorithm::Argon2d,
        Variant::I => argon2::Algorithm::Argon2i,
        Variant::Id => argon2::Algorithm::Argon2id,
    };
    let params = argon2::Params::new(
        descriptor.m_cost,
        descriptor.t_cost,
        descriptor.lanes,
        Some(descriptor.hash_size as usize),
    )
    .expect("vector parameters are valid for the reference");
    let argon2 = argon2::Argon2::new(algorithm, argon2::Version::V0x13, params);

    let mut out = vec![0u8; descriptor.hash_size as usize];
    argon2
        .hash_password_into(password, descriptor.salt(), &mut out)
        .expect("reference hashing succeeds");
    out
}

#[test]
fn all_vectors_are_valid() {
    for (encoded, _) in VECTORS {
        assert!(is_valid(encoded), "rejected: {encoded}");
    }
}

#[test]
fn vectors_match_the_reference_tag() {
    for (encoded, password) in VECTORS {
        let (descriptor, expected) = decode(encoded).expect("vector decodes");
        let tag = reference_tag(password.as_bytes(), &descriptor);
        assert_eq!(
            &expected[..descriptor.hash_size as usize],
            &tag[..],
            "tag mismatch for {encoded}"
        );
        // The cell tail stays zero so uniform-width compares are safe.
        assert!(expected[descriptor.hash_size as usize..].iter().all(|&b| b == 0));
    }
}

#[test]
fn a_single_flipped_password_byte_misses() {
    let (descriptor, expected) = decode(VECTORS[0].0).expect("vector decodes");
    let tag = reference_tag(b"passwore", &descriptor);
    assert_ne!(&expected[..descriptor.hash_size as usize], &tag[..]);
}

#[test]
fn variant_feeds_the_tag() {
    // Same password, salt and costs; d and i vectors must decode to
    // different expected tags.
    let (da, tag_a) = decode(VECTORS[0].0).expect("argon2d vector decodes");
    let (db, tag_b) = decode(VECTORS[1].0).expect("argon2i vector decodes");
    assert_eq!(da.salt(), db.salt());
    assert_eq!(da.m_cost, db.m_cost);
    assert_ne!(tag_a, tag_b);
}

#[test]
fn version_0x10_is_rejected() {
    let legacy =
        "$argon2i$v=16$m=65536,t=2,p=1$c29tZXNhbHQ$9sTbSlTio3Biev89thdrlKKiCaYsjjYVJxGAL3swxpQ";
    assert!(!is_valid(legacy));
    assert!(matches!(decode(legacy), Err(EngineError::Unsupported(_))));
}

#[test]
fn four_byte_tags_are_rejected() {
    // Valid base64, tag decodes to 4 bytes — below the acceptance floor.
    let short = "$argon2d$v=19$m=4096,t=3,p=1$c2hvcnRfc2FsdA$3q2+7w";
    assert!(!is_valid(short));
    assert!(matches!(decode(short), Err(EngineError::Unsupported(_))));
}

#[test]
fn multi_lane_vector_carries_its_costs() {
    let (descriptor, _) = decode(VECTORS[3].0).expect("vector decodes");
    assert_eq!(descriptor.t_cost, 4);
    assert_eq!(descriptor.m_cost, 16384);
    assert_eq!(descriptor.lanes, 3);
    assert_eq!(descriptor.hash_size, 103);
    assert_eq!(descriptor.type_cost(), 1);
    assert_eq!(descriptor.segment_blocks(), 1365);
}
