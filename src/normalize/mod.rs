//! Title and folder-name normalization
//!
//! Every place two records are compared or joined goes through `slug_key`,
//! so the rules here are the identity contract for the whole crate.

/// Canonicalize a title or folder name for display and filesystem use.
///
/// Folds Unicode to ASCII, strips characters that are illegal in paths
/// (plus quotation marks), collapses whitespace runs, trims, and drops a
/// single trailing period. Total: any input yields a valid (possibly
/// empty) string.
pub fn normalize(text: &str) -> String {
    let folded = deunicode::deunicode(text);

    let mut cleaned = String::with_capacity(folded.len());
    for ch in folded.chars() {
        match ch {
            '\\' | '/' | ':' | '*' | '?' | '<' | '>' | '|' | '"' | '\'' | '`' => {}
            c => cleaned.push(c),
        }
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}

/// Derive the canonical lookup key for a title or folder name.
///
/// Builds on [`normalize`], additionally removing `,` `!` `.` `"`,
/// hyphenating whitespace and lowercasing. Idempotent:
/// `slug_key(slug_key(x)) == slug_key(x)`.
pub fn slug_key(text: &str) -> String {
    let base = normalize(text);

    let mut cleaned = String::with_capacity(base.len());
    for ch in base.chars() {
        match ch {
            ',' | '!' | '.' | '"' => {}
            c => cleaned.push(c),
        }
    }

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_illegal_chars() {
        assert_eq!(normalize("Fate/Grand Order: Turas Realta"), "FateGrand Order Turas Realta");
        assert_eq!(normalize("  What's  a   \"Demon\"?  "), "Whats a Demon");
    }

    #[test]
    fn test_normalize_drops_single_trailing_period() {
        assert_eq!(normalize("Dr. Stone."), "Dr. Stone");
        // Only one trailing period is removed.
        assert_eq!(normalize("Huh.."), "Huh.");
    }

    #[test]
    fn test_normalize_folds_unicode() {
        assert_eq!(normalize("Yōkoso Jitsuryoku"), "Yokoso Jitsuryoku");
        assert_eq!(normalize("Ōoku"), "Ooku");
    }

    #[test]
    fn test_slug_key() {
        assert_eq!(slug_key("One Piece"), "one-piece");
        assert_eq!(slug_key("Komi-san wa, Komyushou desu."), "komi-san-wa-komyushou-desu");
        assert_eq!(slug_key("Go! Go! Loser Ranger!"), "go-go-loser-ranger");
    }

    #[test]
    fn test_slug_key_is_idempotent() {
        for s in [
            "One Piece",
            "Dr. STONE",
            "Yōkoso Jitsuryoku Shijou Shugi no Kyoushitsu e",
            "  odd   spacing  . ",
            "",
        ] {
            let once = slug_key(s);
            assert_eq!(slug_key(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_non_title_input_yields_empty() {
        assert_eq!(normalize("   "), "");
        assert_eq!(slug_key("?*|"), "");
    }
}
