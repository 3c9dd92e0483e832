//! Escaping for values interpolated into selector expressions

/// Escape an identifier for use after `#` or `.` in a CSS selector.
///
/// Follows the CSSOM `CSS.escape()` algorithm.
pub fn css_ident(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 4);
    for (index, &ch) in chars.iter().enumerate() {
        match ch {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => push_code_point(&mut out, ch),
            '0'..='9' if index == 0 => push_code_point(&mut out, ch),
            '0'..='9' if index == 1 && chars[0] == '-' => push_code_point(&mut out, ch),
            '-' if index == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if c >= '\u{80}' || c == '-' || c == '_' || c.is_ascii_alphanumeric() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

fn push_code_point(out: &mut String, ch: char) {
    out.push_str(&format!("\\{:x} ", ch as u32));
}

/// Quote a value for a CSS attribute selector (`[name="..."]`).
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            '\r' => out.push_str("\\d "),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Build an XPath string literal. XPath 1.0 has no escape sequence, so a
/// value holding both quote styles is composed with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let mut parts = Vec::new();
    for (index, chunk) in value.split('\'').enumerate() {
        if index > 0 {
            parts.push("\"'\"".to_string());
        }
        if !chunk.is_empty() {
            parts.push(format!("'{}'", chunk));
        }
    }
    format!("concat({})", parts.join(", "))
}

/// Escape regex metacharacters for `text=/.../i` selectors.
pub fn regex_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(
            ch,
            '\\' | '.' | '^' | '$' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '/'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_ident_plain() {
        assert_eq!(css_ident("login-btn"), "login-btn");
        assert_eq!(css_ident("btn_primary"), "btn_primary");
    }

    #[test]
    fn test_css_ident_special_characters() {
        assert_eq!(css_ident("user:name"), "user\\:name");
        assert_eq!(css_ident("a.b"), "a\\.b");
        assert_eq!(css_ident("1st"), "\\31 st");
        assert_eq!(css_ident("-2x"), "-\\32 x");
        assert_eq!(css_ident("-"), "\\-");
    }

    #[test]
    fn test_css_string_quotes() {
        assert_eq!(css_string("plain"), "\"plain\"");
        assert_eq!(css_string("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(css_string("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn test_xpath_literal_quote_styles() {
        assert_eq!(xpath_literal("Submit"), "'Submit'");
        assert_eq!(xpath_literal("Don't"), "\"Don't\"");
        assert_eq!(
            xpath_literal("it's \"quoted\""),
            "concat('it', \"'\", 's \"quoted\"')"
        );
    }

    #[test]
    fn test_regex_literal() {
        assert_eq!(regex_literal("Total (USD)"), "Total \\(USD\\)");
        assert_eq!(regex_literal("a/b"), "a\\/b");
    }
}
