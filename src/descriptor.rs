//! Output descriptor grammar.
//!
//! A descriptor is a script function applied to key expressions, with an
//! optional 8-character checksum suffix, e.g.
//! `wpkh([d34db33f/84h/0h/0h]xpub.../0/*)#8tqzk4mq`. The loader only needs
//! to decide whether a stored string is well formed under this grammar;
//! script construction and key validity are the concern of other layers.

use thiserror::Error;

/// Characters a descriptor payload may contain. The position of a character
/// in this table feeds the checksum, so the table is order-sensitive.
const INPUT_CHARSET: &str =
    "0123456789()[],'/*abcdefgh@:$%{}IJKLMNOPQRSTUVWXYZ&+-.;<=>?!^_|~ijklmnopqrstuvwxyzABCDEFGH`#\"\\ ";

/// Alphabet of the checksum suffix.
const CHECKSUM_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Maximum number of keys accepted inside `multi`/`sortedmulti`.
const MAX_MULTISIG_KEYS: usize = 20;

/// Errors produced when a descriptor string is rejected by the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("descriptor is empty")]
    Empty,
    #[error("invalid character {ch:?} in descriptor")]
    InvalidCharacter { ch: char },
    #[error("unknown script function {0:?}")]
    UnknownFunction(String),
    #[error("script function {0:?} is not allowed at this position")]
    DisallowedFunction(String),
    #[error("malformed descriptor: {0}")]
    Malformed(String),
    #[error("invalid key expression: {0}")]
    InvalidKey(String),
    #[error("invalid multisig threshold {threshold} for {keys} keys")]
    InvalidThreshold { threshold: u32, keys: usize },
    #[error("malformed checksum: {0}")]
    MalformedChecksum(String),
    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },
}

/// One step of a derivation path, e.g. `84h` or `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationStep {
    pub index: u32,
    pub hardened: bool,
}

/// Key origin metadata: master key fingerprint plus derivation steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOrigin {
    pub fingerprint: [u8; 4],
    pub path: Vec<DerivationStep>,
}

/// A key expression inside a script function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExpr {
    pub origin: Option<KeyOrigin>,
    pub key: String,
    pub path: Vec<DerivationStep>,
    pub wildcard: bool,
}

/// Parsed script expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptExpr {
    Pk(KeyExpr),
    Pkh(KeyExpr),
    Wpkh(KeyExpr),
    Combo(KeyExpr),
    Sh(Box<ScriptExpr>),
    Wsh(Box<ScriptExpr>),
    Multi {
        threshold: u32,
        keys: Vec<KeyExpr>,
        sorted: bool,
    },
    Tr(KeyExpr),
    Addr(String),
    Raw(Vec<u8>),
}

/// A descriptor accepted by the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub script: ScriptExpr,
    pub checksum: Option<String>,
}

/// Nesting position of a script expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Top,
    InsideSh,
    InsideWsh,
}

/// Parse and validate a descriptor string.
pub fn parse(input: &str) -> Result<Descriptor, DescriptorError> {
    if input.is_empty() {
        return Err(DescriptorError::Empty);
    }
    let (payload, checksum) = split_checksum(input)?;
    for ch in payload.chars() {
        if !INPUT_CHARSET.contains(ch) {
            return Err(DescriptorError::InvalidCharacter { ch });
        }
    }
    if let Some(found) = &checksum {
        let expected = checksum_of(payload)?;
        if *found != expected {
            return Err(DescriptorError::ChecksumMismatch {
                expected,
                found: found.clone(),
            });
        }
    }
    let script = parse_expr(payload, Position::Top)?;
    Ok(Descriptor { script, checksum })
}

/// Compute the checksum suffix for a descriptor payload (without `#`).
pub fn checksum_of(payload: &str) -> Result<String, DescriptorError> {
    let mut c: u64 = 1;
    let mut cls: u64 = 0;
    let mut cls_count = 0u8;
    for ch in payload.chars() {
        let pos = INPUT_CHARSET
            .chars()
            .position(|candidate| candidate == ch)
            .ok_or(DescriptorError::InvalidCharacter { ch })? as u64;
        c = polymod(c, pos & 31);
        cls = cls * 3 + (pos >> 5);
        cls_count += 1;
        if cls_count == 3 {
            c = polymod(c, cls);
            cls = 0;
            cls_count = 0;
        }
    }
    if cls_count > 0 {
        c = polymod(c, cls);
    }
    for _ in 0..8 {
        c = polymod(c, 0);
    }
    c ^= 1;
    let table = CHECKSUM_CHARSET.as_bytes();
    Ok((0..8)
        .map(|j| table[((c >> (5 * (7 - j))) & 31) as usize] as char)
        .collect())
}

fn polymod(c: u64, val: u64) -> u64 {
    let c0 = c >> 35;
    let mut c = ((c & 0x7_ffff_ffff) << 5) ^ val;
    if c0 & 1 != 0 {
        c ^= 0xf5_dee5_1989;
    }
    if c0 & 2 != 0 {
        c ^= 0xa9_fdca_3312;
    }
    if c0 & 4 != 0 {
        c ^= 0x1b_ab10_e32d;
    }
    if c0 & 8 != 0 {
        c ^= 0x37_06b1_677a;
    }
    if c0 & 16 != 0 {
        c ^= 0x64_4d62_6ffd;
    }
    c
}

fn split_checksum(input: &str) -> Result<(&str, Option<String>), DescriptorError> {
    let Some(pos) = input.find('#') else {
        return Ok((input, None));
    };
    let payload = &input[..pos];
    let suffix = &input[pos + 1..];
    if suffix.contains('#') {
        return Err(DescriptorError::MalformedChecksum(
            "multiple checksum separators".to_string(),
        ));
    }
    if suffix.len() != 8 {
        return Err(DescriptorError::MalformedChecksum(format!(
            "expected 8 characters, got {}",
            suffix.len()
        )));
    }
    if let Some(ch) = suffix.chars().find(|ch| !CHECKSUM_CHARSET.contains(*ch)) {
        return Err(DescriptorError::MalformedChecksum(format!(
            "invalid character {ch:?}"
        )));
    }
    Ok((payload, Some(suffix.to_string())))
}

fn parse_expr(input: &str, position: Position) -> Result<ScriptExpr, DescriptorError> {
    let open = input
        .find('(')
        .ok_or_else(|| DescriptorError::Malformed("missing script function".to_string()))?;
    let func = &input[..open];
    if !input.ends_with(')') {
        return Err(DescriptorError::Malformed(
            "unterminated script function".to_string(),
        ));
    }
    let body = &input[open + 1..input.len() - 1];
    match func {
        "pk" => Ok(ScriptExpr::Pk(parse_key(body)?)),
        "pkh" => Ok(ScriptExpr::Pkh(parse_key(body)?)),
        "wpkh" => {
            if position == Position::InsideWsh {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            Ok(ScriptExpr::Wpkh(parse_key(body)?))
        }
        "combo" => {
            if position != Position::Top {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            Ok(ScriptExpr::Combo(parse_key(body)?))
        }
        "sh" => {
            if position != Position::Top {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            Ok(ScriptExpr::Sh(Box::new(parse_expr(
                body,
                Position::InsideSh,
            )?)))
        }
        "wsh" => {
            if position == Position::InsideWsh {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            Ok(ScriptExpr::Wsh(Box::new(parse_expr(
                body,
                Position::InsideWsh,
            )?)))
        }
        "multi" | "sortedmulti" => parse_multi(body, func == "sortedmulti"),
        "tr" => {
            if position != Position::Top {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            Ok(ScriptExpr::Tr(parse_key(body)?))
        }
        "addr" => {
            if position != Position::Top {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            if body.is_empty() || !body.chars().all(|ch| ch.is_ascii_alphanumeric()) {
                return Err(DescriptorError::Malformed("invalid address".to_string()));
            }
            Ok(ScriptExpr::Addr(body.to_string()))
        }
        "raw" => {
            if position != Position::Top {
                return Err(DescriptorError::DisallowedFunction(func.to_string()));
            }
            let bytes = hex::decode(body)
                .map_err(|_| DescriptorError::Malformed("invalid raw script hex".to_string()))?;
            Ok(ScriptExpr::Raw(bytes))
        }
        other => Err(DescriptorError::UnknownFunction(other.to_string())),
    }
}

fn parse_multi(body: &str, sorted: bool) -> Result<ScriptExpr, DescriptorError> {
    let mut parts = body.split(',');
    let threshold_text = parts
        .next()
        .ok_or_else(|| DescriptorError::Malformed("empty multisig body".to_string()))?;
    let threshold: u32 = threshold_text
        .parse()
        .map_err(|_| DescriptorError::Malformed("invalid multisig threshold".to_string()))?;
    let keys = parts.map(parse_key).collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() || keys.len() > MAX_MULTISIG_KEYS {
        return Err(DescriptorError::Malformed(format!(
            "multisig must contain between 1 and {MAX_MULTISIG_KEYS} keys"
        )));
    }
    if threshold == 0 || threshold as usize > keys.len() {
        return Err(DescriptorError::InvalidThreshold {
            threshold,
            keys: keys.len(),
        });
    }
    Ok(ScriptExpr::Multi {
        threshold,
        keys,
        sorted,
    })
}

fn parse_key(input: &str) -> Result<KeyExpr, DescriptorError> {
    let (origin, rest) = parse_origin(input)?;
    let mut steps = rest.split('/');
    let key = steps
        .next()
        .unwrap_or_default()
        .to_string();
    if key.is_empty() {
        return Err(DescriptorError::InvalidKey("empty key body".to_string()));
    }
    if !key.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(DescriptorError::InvalidKey(format!(
            "invalid key body {key:?}"
        )));
    }
    let mut path = Vec::new();
    let mut wildcard = false;
    for step in steps {
        if wildcard {
            return Err(DescriptorError::InvalidKey(
                "derivation continues past wildcard".to_string(),
            ));
        }
        if step == "*" || step == "*h" || step == "*'" {
            wildcard = true;
            continue;
        }
        path.push(parse_step(step)?);
    }
    Ok(KeyExpr {
        origin,
        key,
        path,
        wildcard,
    })
}

fn parse_origin(input: &str) -> Result<(Option<KeyOrigin>, &str), DescriptorError> {
    if !input.starts_with('[') {
        return Ok((None, input));
    }
    let close = input
        .find(']')
        .ok_or_else(|| DescriptorError::InvalidKey("unterminated key origin".to_string()))?;
    let inner = &input[1..close];
    let mut parts = inner.split('/');
    let fingerprint_text = parts
        .next()
        .ok_or_else(|| DescriptorError::InvalidKey("empty key origin".to_string()))?;
    if fingerprint_text.len() != 8 {
        return Err(DescriptorError::InvalidKey(
            "fingerprint must be 8 hex characters".to_string(),
        ));
    }
    let bytes = hex::decode(fingerprint_text)
        .map_err(|_| DescriptorError::InvalidKey("invalid fingerprint hex".to_string()))?;
    let mut fingerprint = [0u8; 4];
    fingerprint.copy_from_slice(&bytes);
    let path = parts.map(parse_step).collect::<Result<Vec<_>, _>>()?;
    Ok((
        Some(KeyOrigin { fingerprint, path }),
        &input[close + 1..],
    ))
}

fn parse_step(step: &str) -> Result<DerivationStep, DescriptorError> {
    let (digits, hardened) = match step.strip_suffix(['h', '\'']) {
        Some(prefix) => (prefix, true),
        None => (step, false),
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DescriptorError::InvalidKey(format!(
            "invalid derivation step {step:?}"
        )));
    }
    let index: u32 = digits
        .parse()
        .map_err(|_| DescriptorError::InvalidKey(format!("derivation step {step:?} overflows")))?;
    if index >= 1 << 31 {
        return Err(DescriptorError::InvalidKey(format!(
            "derivation step {step:?} exceeds the hardened boundary"
        )));
    }
    Ok(DerivationStep { index, hardened })
}
