//! Reversible escaping for values embedded inside dotted node strings.
//!
//! A meta node is stored as `meta.<key>.<value>`, so a literal `.` inside the
//! key or value would be read back as a segment separator. Values are escaped
//! when a node is built and unescaped by the meta resolver.
//!
//! `{` is escaped first, so every brace in escaped text opens a placeholder
//! and any input string round-trips.

const REPLACEMENTS: [(&str, &str); 4] = [("{", "{LBR}"), (".", "{SEP}"), ("/", "{FSEP}"), ("$", "{DSEP}")];

/// Replaces separator characters with their placeholder tokens.
pub fn escape(s: &str) -> String {
    let mut out = s.to_owned();
    for (raw, token) in REPLACEMENTS {
        out = out.replace(raw, token);
    }
    out
}

/// Reverses [`escape`]. Placeholders are restored in reverse order, `{LBR}`
/// last.
pub fn unescape(s: &str) -> String {
    let mut out = s.to_owned();
    for (raw, token) in REPLACEMENTS.iter().rev() {
        out = out.replace(token, raw);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_separators() {
        assert_eq!(escape("a.b/c$d"), "a{SEP}b{FSEP}c{DSEP}d");
    }

    #[test]
    fn unescape_restores_literal() {
        assert_eq!(unescape("v1{SEP}2"), "v1.2");
        assert_eq!(unescape(&escape("&c[Mod.]")), "&c[Mod.]");
    }

    #[test]
    fn literal_placeholders_round_trip() {
        assert_eq!(escape("{SEP}"), "{LBR}SEP}");
        assert_eq!(unescape(&escape("{SEP}")), "{SEP}");
        assert_eq!(unescape(&escape("a{LBR}.b{")), "a{LBR}.b{");
        assert_eq!(unescape(&escape("{{DSEP}}")), "{{DSEP}}");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(escape("[Admin]"), "[Admin]");
        assert_eq!(unescape("[Admin]"), "[Admin]");
    }
}
