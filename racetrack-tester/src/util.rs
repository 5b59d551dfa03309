use anyhow::{Context, Result};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a comma-separated seed list. Accepts decimal or `0x`-prefixed hex.
pub fn parse_seeds(s: &str) -> Result<Vec<u64>> {
    split_csv(s)
        .iter()
        .map(|token| {
            let parsed = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .map_or_else(|| token.parse::<u64>(), |hex| u64::from_str_radix(hex, 16));
            parsed.with_context(|| format!("invalid seed '{token}'"))
        })
        .collect()
}
