use anyhow::{Result, bail};
use std::collections::HashSet;
use yourday_core::derive_stream_seed;

const DEFAULT_SEED: u64 = 1337;
const WORD_SEED_DOMAIN: &[u8] = b"yourday-sim-word";

/// Seed metadata for a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// Word the seed was derived from, if any.
    pub word: Option<String>,
}

impl SeedInfo {
    #[must_use]
    pub const fn from_numeric(seed: u64) -> Self {
        Self { seed, word: None }
    }

    #[must_use]
    pub fn from_word(word: &str) -> Self {
        let normalized = word.to_ascii_lowercase();
        let seed = derive_stream_seed(0, normalized.as_bytes());
        Self {
            seed,
            word: Some(normalized),
        }
    }

    #[must_use]
    pub fn label(&self) -> String {
        match &self.word {
            Some(word) => format!("{word} ({})", self.seed),
            None => self.seed.to_string(),
        }
    }
}

/// Resolve CLI seed tokens into canonical seeds.
///
/// Accepts integers (negative values use their magnitude) and plain words,
/// which hash to a stable seed. `range:A..B` expands to every seed in the
/// half-open range.
///
/// # Errors
///
/// Returns an error for malformed ranges or tokens with non-word characters.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some(range) = token.strip_prefix("range:") {
            pending.extend(expand_range(range)?);
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            pending.push(SeedInfo::from_numeric(value.unsigned_abs()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            pending.push(SeedInfo::from_numeric(value));
            continue;
        }

        if token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            pending.push(SeedInfo::from_word(token));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    let mut seen = HashSet::new();
    let mut deduped: Vec<SeedInfo> = Vec::new();
    for info in pending {
        if seen.insert(info.seed) {
            deduped.push(info);
        } else if info.word.is_some()
            && let Some(entry) = deduped.iter_mut().find(|e| e.seed == info.seed)
            && entry.word.is_none()
        {
            *entry = info;
        }
    }

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(deduped)
}

fn expand_range(range: &str) -> Result<Vec<SeedInfo>> {
    let Some((start, end)) = range.split_once("..") else {
        bail!("Seed range must look like range:A..B, got {range}");
    };
    let (Ok(start), Ok(end)) = (start.trim().parse::<u64>(), end.trim().parse::<u64>()) else {
        bail!("Seed range bounds must be integers: {range}");
    };
    if start >= end {
        bail!("Seed range is empty: {range}");
    }
    Ok((start..end).map(SeedInfo::from_numeric).collect())
}
