// src/exec/quote.rs

/// Wrap `s` in double quotes. Nothing inside is escaped.
pub fn quote(s: &str) -> String {
    format!("\"{s}\"")
}
