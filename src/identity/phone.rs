use crate::error::AppError;

const MIN_DIGITS: usize = 10;
const MAX_E164_DIGITS: usize = 15;

fn invalid() -> AppError {
    AppError::invalid("phone_number", "Please enter a valid phone number.")
}

/// Normalizes user input to E.164. National numbers (no `+` or `00`
/// prefix) get `country_code` prepended.
pub fn normalize_phone(raw: &str, country_code: &str) -> Result<String, AppError> {
    let mut s: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    // Support "00" prefix
    if let Some(rest) = s.strip_prefix("00") {
        s = format!("+{rest}");
    }

    let international = s.starts_with('+');
    let digits = s.trim_start_matches('+');
    if digits.len() < MIN_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let e164 = if international {
        format!("+{digits}")
    } else {
        format!("+{country_code}{}", digits.trim_start_matches('0'))
    };

    if e164.len() - 1 > MAX_E164_DIGITS {
        return Err(AppError::invalid(
            "phone_number",
            "phone number too long (max 15 digits)",
        ));
    }
    Ok(e164)
}
