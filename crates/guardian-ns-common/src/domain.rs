/// Converts a domain name to the form used as a target table key: lower-case with a trailing dot.
///
/// Surrounding whitespace is removed. The root name normalizes to `"."`.
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    normalized.extend(trimmed.chars().map(|c| c.to_ascii_lowercase()));
    if !normalized.ends_with('.') {
        normalized.push('.');
    }
    normalized
}

/// Checks hostname syntax: `a-z`, `0-9` and `-` in labels of 1-63 bytes, no leading or trailing
/// hyphens, at least two labels and an alphabetic TLD. A single trailing dot is allowed.
pub fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let mut labels = domain.split('.').peekable();
    let mut label_count = 0;
    while let Some(label) = labels.next() {
        label_count += 1;
        let bytes = label.as_bytes();
        if bytes.is_empty() || bytes.len() > 63 {
            return false;
        }
        if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
            return false;
        }
        if !bytes.iter().all(|byte| byte.is_ascii_alphanumeric() || *byte == b'-') {
            return false;
        }
        if labels.peek().is_none() && !bytes.iter().all(u8::is_ascii_alphabetic) {
            // Bad TLD: 'example.t3st'
            return false;
        }
    }

    label_count > 1
}
