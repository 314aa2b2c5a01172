#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the target decoder.

use data_encoding::BASE64_NOPAD;
use proptest::prelude::*;
use quarry_argon2_gpu::{decode, is_valid, Variant};

fn reference_tag(
    password: &[u8],
    salt: &[u8],
    variant: Variant,
    m_cost: u32,
    t_cost: u32,
    lanes: u32,
    tag_len: usize,
) -> Vec<u8> {
    let algorithm = match variant {
        Variant::D => argon2::Algorithm::Argon2d,
        Variant::I => argon2::Algorithm::Argon2i,
        Variant::Id => argon2::Algorithm::Argon2id,
    };
    let params = argon2::Params::new(m_cost, t_cost, lanes, Some(tag_len))
        .expect("generated parameters are valid");
    let argon2 = argon2::Argon2::new(algorithm, argon2::Version::V0x13, params);
    let mut out = vec![0u8; tag_len];
    argon2
        .hash_password_into(password, salt, &mut out)
        .expect("reference hashing succeeds");
    out
}

fn variant_strategy() -> impl Strategy<Value = Variant> {
    prop_oneof![Just(Variant::D), Just(Variant::I), Just(Variant::Id)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A synthesized encoded form round-trips: the decoded descriptor carries
    /// the generated parameters, and the expected tag equals the trusted CPU
    /// reference of the generating password.
    #[test]
    fn decode_round_trips_with_the_reference(
        password in proptest::collection::vec(any::<u8>(), 0..40),
        salt in proptest::collection::vec(any::<u8>(), 8..33),
        variant in variant_strategy(),
        t_cost in 1u32..3,
        lanes in 1u32..4,
        m_factor in 1u32..4,
        tag_len in 8usize..48,
    ) {
        let m_cost = 8 * lanes * m_factor;
        let tag = reference_tag(&password, &salt, variant, m_cost, t_cost, lanes, tag_len);

        let encoded = format!(
            "${}$v=19$m={m_cost},t={t_cost},p={lanes}${}${}",
            variant.as_str(),
            BASE64_NOPAD.encode(&salt),
            BASE64_NOPAD.encode(&tag),
        );

        let (descriptor, cell) = decode(&encoded).expect("synthesized hash decodes");
        prop_assert_eq!(descriptor.variant, variant);
        prop_assert_eq!(descriptor.m_cost, m_cost);
        prop_assert_eq!(descriptor.t_cost, t_cost);
        prop_assert_eq!(descriptor.lanes, lanes);
        prop_assert_eq!(descriptor.hash_size as usize, tag_len);
        prop_assert_eq!(descriptor.salt(), &salt[..]);
        prop_assert_eq!(&cell[..tag_len], &tag[..]);
    }

    /// Tag bytes are position-sensitive: corrupting any one byte of the
    /// expected tag breaks equality with the reference.
    #[test]
    fn corrupted_tags_do_not_compare_equal(
        flip in 0usize..32,
    ) {
        let salt = b"a_fixed_proptest_salt";
        let mut tag = reference_tag(b"hunter2", salt, Variant::Id, 32, 1, 1, 32);
        tag[flip] ^= 0x01;
        let good = reference_tag(b"hunter2", salt, Variant::Id, 32, 1, 1, 32);
        prop_assert_ne!(tag, good);
    }

    /// The validator never panics, whatever the input looks like.
    #[test]
    fn is_valid_never_panics(input in "\\PC*") {
        let _ = is_valid(&input);
    }

    /// Mangling the variant tag always rejects.
    #[test]
    fn unknown_variant_tags_reject(suffix in "[a-z0-9]{1,8}") {
        let encoded = format!(
            "$argon2{suffix}x$v=19$m=4096,t=3,p=1$c2hvcnRfc2FsdA$TLSTPihIo+5F67Y1vJdfWdB9"
        );
        prop_assert!(!is_valid(&encoded));
    }
}
