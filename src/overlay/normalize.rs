//! Text cleanup applied before tokenization.
//!
//! The recognizer jams tokens together and sprinkles punctuation; this pass
//! restores the separators the field matchers rely on. Camera-token
//! normalization is separate (see `parser::normalize_camera_token`).

/// Normalize a raw recognized overlay line:
/// uppercase, strip junk punctuation, and re-insert the token breaks the
/// recognizer tends to swallow (`23C29.09INHG`, a date glued to its time).
pub fn normalize_overlay_text(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();

    // Keep word characters and the separators the overlay itself uses.
    let mut cleaned = String::with_capacity(upper.len());
    for ch in upper.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '/' | ':' | '.' | '-' | '_') {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }

    let chars: Vec<char> = cleaned.chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);
    for (i, &ch) in chars.iter().enumerate() {
        out.push(ch);

        let prev_is_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let next_is_digit = chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());

        // 23C29.09 -> 23C 29.09
        if ch == 'C' && prev_is_digit && next_is_digit {
            out.push(' ');
        }

        // 12/06/202505:41PM -> 12/06/2025 05:41PM
        if next_is_digit && ends_with_date_shape(&chars[..=i]) {
            out.push(' ');
        }
    }

    // 29.09INHG -> 29.09 INHG
    let out = out.replace("INHG", " INHG");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the slice ends in a `DD/DD/DDDD` window that is not part of a
/// longer digit run.
fn ends_with_date_shape(chars: &[char]) -> bool {
    if chars.len() < 10 {
        return false;
    }
    let tail = &chars[chars.len() - 10..];
    let shaped = tail.iter().enumerate().all(|(i, c)| match i {
        2 | 5 => *c == '/',
        _ => c.is_ascii_digit(),
    });
    if !shaped {
        return false;
    }
    match chars.len().checked_sub(11).map(|i| chars[i]) {
        Some(before) => !before.is_ascii_digit() && before != '/',
        None => true,
    }
}
