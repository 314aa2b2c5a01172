//! Decoding of Argon2 encoded target hashes.
//!
//! The encoded form is the PHC-style string
//! `$argon2{d,i,id}$v=19$m=<kib>,t=<passes>,p=<lanes>$<salt>$<tag>` with both
//! trailing fields in unpadded standard base64. [`decode`] turns one of these
//! into an immutable [`SaltDescriptor`] plus the expected tag, stored in a
//! fixed-size [`TagCell`] so every target compares through the same layout.
//!
//! Rejections never reach the pipeline: unknown variant tag, any version
//! other than 0x13, tags shorter than 8 bytes, and malformed fields all fail
//! here.

use crate::error::EngineError;
use crate::{MAX_SALT, MAX_TAG, SYNC_POINTS};
use data_encoding::BASE64_NOPAD;

/// The only supported Argon2 version (`v=19`).
pub const VERSION_13: u32 = 0x13;

/// Obsolete version the validator explicitly turns away.
const VERSION_10: u32 = 0x10;

/// Tags shorter than this are rejected even though the encoded form can
/// carry down to 4 bytes.
const MIN_TAG: usize = 8;

/// Shortest tag the encoded form itself may carry.
const MIN_TAG_ENCODED: usize = 4;

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Argon2 variant: data-dependent, data-independent, or hybrid addressing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// `argon2d` — addressing depends on password and salt.
    D,
    /// `argon2i` — addressing is input-independent.
    I,
    /// `argon2id` — first half of the first pass `i`, the rest `d`.
    Id,
}

impl Variant {
    /// Index of the device entry point `argon2_kernel_segment_<k>`.
    #[must_use]
    pub const fn kernel_index(self) -> u32 {
        match self {
            Self::D => 0,
            Self::I => 1,
            Self::Id => 2,
        }
    }

    /// Lowercase name as it appears in the encoded form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::D => "argon2d",
            Self::I => "argon2i",
            Self::Id => "argon2id",
        }
    }

    // `$argon2id$` must be tried before `$argon2i$`: the shorter tag is a
    // prefix of the longer one.
    fn strip_tag(encoded: &str) -> Option<(Self, &str)> {
        for (tag, variant) in [
            ("$argon2id$", Self::Id),
            ("$argon2i$", Self::I),
            ("$argon2d$", Self::D),
        ] {
            if let Some(rest) = encoded.strip_prefix(tag) {
                return Some((variant, rest));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Salt descriptor
// ---------------------------------------------------------------------------

/// Immutable description of one target's salt and cost parameters.
///
/// Decoded once per target and borrowed for the duration of a batch. The
/// geometry helpers below derive everything the planner and pipeline need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaltDescriptor {
    /// Argon2 variant.
    pub variant: Variant,
    /// Argon2 version; always [`VERSION_13`] after decoding.
    pub version: u32,
    /// Number of passes over memory (`t`).
    pub t_cost: u32,
    /// Target memory in KiB-sized blocks (`m`).
    pub m_cost: u32,
    /// Degree of parallelism (`p`).
    pub lanes: u32,
    /// Tag length in bytes.
    pub hash_size: u32,
    salt_len: u32,
    salt: [u8; MAX_SALT],
}

impl SaltDescriptor {
    /// The decoded salt bytes.
    #[must_use]
    pub fn salt(&self) -> &[u8] {
        &self.salt[..self.salt_len as usize]
    }

    /// Blocks per (lane, slice): `max(m_cost / (lanes * 4), 2)`.
    #[must_use]
    pub const fn segment_blocks(&self) -> u32 {
        let blocks = match self.m_cost.checked_div(self.lanes.saturating_mul(SYNC_POINTS)) {
            Some(blocks) => blocks,
            None => 0,
        };
        if blocks < 2 {
            2
        } else {
            blocks
        }
    }

    /// Effective memory per candidate, in blocks. May exceed `m_cost` for
    /// tiny parameters because of the floor in [`Self::segment_blocks`].
    #[must_use]
    pub const fn blocks_per_candidate(&self) -> u32 {
        self.lanes
            .saturating_mul(SYNC_POINTS)
            .saturating_mul(self.segment_blocks())
    }

    /// Effective memory per candidate, in bytes.
    #[must_use]
    pub const fn bytes_per_candidate(&self) -> usize {
        (self.blocks_per_candidate() as usize).saturating_mul(crate::BLOCK_BYTES)
    }

    /// The variant as a tunable cost (`0` = d, `1` = i, `2` = id).
    #[must_use]
    pub const fn type_cost(&self) -> u32 {
        self.variant.kernel_index()
    }
}

/// Fixed-size expected-tag storage: tag bytes at offset 0, zero tail.
pub type TagCell = [u8; MAX_TAG];

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode an encoded Argon2 hash into its salt descriptor and expected tag.
///
/// # Errors
///
/// [`EngineError::Decode`] for anything that does not parse,
/// [`EngineError::Unsupported`] for version 0x10 and tags shorter than
/// 8 bytes.
pub fn decode(encoded: &str) -> Result<(SaltDescriptor, TagCell), EngineError> {
    let (variant, rest) = Variant::strip_tag(encoded)
        .ok_or_else(|| EngineError::Decode("unrecognized variant tag".into()))?;

    let mut fields = rest.split('$');
    let version = parse_version(next_field(&mut fields)?)?;
    let (m_cost, t_cost, lanes) = parse_costs(next_field(&mut fields)?)?;
    let salt_bytes = decode_b64(next_field(&mut fields)?, "salt")?;
    let tag_bytes = decode_b64(next_field(&mut fields)?, "tag")?;
    if fields.next().is_some() {
        return Err(EngineError::Decode("trailing field after tag".into()));
    }

    if salt_bytes.len() > MAX_SALT {
        return Err(EngineError::Decode(format!(
            "salt is {} bytes, maximum is {MAX_SALT}",
            salt_bytes.len()
        )));
    }
    if tag_bytes.len() < MIN_TAG_ENCODED || tag_bytes.len() > MAX_TAG {
        return Err(EngineError::Decode(format!(
            "tag is {} bytes, expected {MIN_TAG_ENCODED}..={MAX_TAG}",
            tag_bytes.len()
        )));
    }
    if tag_bytes.len() < MIN_TAG {
        return Err(EngineError::Unsupported(format!(
            "tag is {} bytes, below the {MIN_TAG}-byte acceptance floor",
            tag_bytes.len()
        )));
    }
    if lanes == 0 || t_cost == 0 {
        return Err(EngineError::Decode("t and p must be at least 1".into()));
    }
    // Widened so an absurd p cannot overflow the comparison.
    let memory_floor = u64::from(lanes).saturating_mul(8);
    if u64::from(m_cost) < memory_floor {
        return Err(EngineError::Decode(format!(
            "m={m_cost} is below the minimum of 8*p={memory_floor}"
        )));
    }

    let mut salt = [0u8; MAX_SALT];
    salt[..salt_bytes.len()].copy_from_slice(&salt_bytes);
    let mut tag: TagCell = [0u8; MAX_TAG];
    tag[..tag_bytes.len()].copy_from_slice(&tag_bytes);

    let descriptor = SaltDescriptor {
        variant,
        version,
        t_cost,
        m_cost,
        lanes,
        hash_size: tag_bytes.len() as u32,
        salt_len: salt_bytes.len() as u32,
        salt,
    };
    Ok((descriptor, tag))
}

/// Whether `encoded` would be accepted by [`decode`].
#[must_use]
pub fn is_valid(encoded: &str) -> bool {
    decode(encoded).is_ok()
}

fn next_field<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, EngineError> {
    fields
        .next()
        .ok_or_else(|| EngineError::Decode("truncated encoded hash".into()))
}

fn parse_version(field: &str) -> Result<u32, EngineError> {
    let value = field
        .strip_prefix("v=")
        .ok_or_else(|| EngineError::Decode("expected v= field".into()))?;
    let version: u32 = value
        .parse()
        .map_err(|_| EngineError::Decode(format!("bad version number {value:?}")))?;
    if version == VERSION_10 {
        return Err(EngineError::Unsupported(
            "argon2 version 0x10 is not supported".into(),
        ));
    }
    if version != VERSION_13 {
        return Err(EngineError::Decode(format!("unknown version {version}")));
    }
    Ok(version)
}

// The cost field is strict about order: `m=`, `t=`, `p=`.
fn parse_costs(field: &str) -> Result<(u32, u32, u32), EngineError> {
    let mut parts = field.split(',');
    let m = parse_cost(parts.next(), "m=")?;
    let t = parse_cost(parts.next(), "t=")?;
    let p = parse_cost(parts.next(), "p=")?;
    if parts.next().is_some() {
        return Err(EngineError::Decode("trailing cost parameter".into()));
    }
    Ok((m, t, p))
}

fn parse_cost(part: Option<&str>, prefix: &str) -> Result<u32, EngineError> {
    let part = part.ok_or_else(|| EngineError::Decode(format!("missing {prefix} parameter")))?;
    let value = part
        .strip_prefix(prefix)
        .ok_or_else(|| EngineError::Decode(format!("expected {prefix} parameter")))?;
    value
        .parse()
        .map_err(|_| EngineError::Decode(format!("bad {prefix} value {value:?}")))
}

fn decode_b64(field: &str, what: &str) -> Result<Vec<u8>, EngineError> {
    BASE64_NOPAD
        .decode(field.as_bytes())
        .map_err(|e| EngineError::Decode(format!("bad base64 in {what}: {e}")))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
