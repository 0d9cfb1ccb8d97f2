//! Best-effort column role detection. Header keywords win; otherwise the
//! first few values of each column are sampled for phone-shaped content.
//! Ambiguous headers can misfire — that is documented behavior, the caller
//! logs which columns were picked so the operator can see it.

const PHONE_KEYWORDS: &[&str] = &[
    "phone", "mobile", "cell", "contact", "tel", "number", "whatsapp",
];

const NAME_KEYWORDS: &[&str] = &["name", "contact", "person", "customer", "client", "user"];

const SAMPLE_ROWS: usize = 5;
const MIN_PHONE_SAMPLES: usize = 3;
const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 7..=15;

/// Strips everything but ASCII digits.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Picks the phone column: first header containing a phone keyword, else the
/// first column where at least 3 of the first 5 values strip down to 7-15
/// digits, else column 0.
pub fn phone_column(headers: &[String], rows: &[Vec<String>]) -> usize {
    if let Some(col) = keyword_column(headers, PHONE_KEYWORDS, None) {
        return col;
    }

    for col in 0..headers.len() {
        let phone_like = rows
            .iter()
            .take(SAMPLE_ROWS)
            .filter(|row| PHONE_DIGITS.contains(&normalize_phone(&row[col]).len()))
            .count();
        if phone_like >= MIN_PHONE_SAMPLES {
            return col;
        }
    }

    0
}

/// Picks the name column among the non-phone columns, falling back to the
/// first non-phone column, or the phone column itself when it is the only one.
pub fn name_column(headers: &[String], phone_col: usize) -> usize {
    if let Some(col) = keyword_column(headers, NAME_KEYWORDS, Some(phone_col)) {
        return col;
    }

    (0..headers.len()).find(|&col| col != phone_col).unwrap_or(phone_col)
}

fn keyword_column(headers: &[String], keywords: &[&str], skip: Option<usize>) -> Option<usize> {
    headers.iter().enumerate().position(|(col, header)| {
        if skip == Some(col) {
            return false;
        }
        let lower = header.to_ascii_lowercase();
        keywords.iter().any(|keyword| lower.contains(keyword))
    })
}
