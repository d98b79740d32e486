use crate::error::Error;

pub const ELLIPSIS: &str = "...";

pub const MIN_LABEL_LENGTH: usize = ELLIPSIS.len() + 1;

pub fn validate_max_length(max_length: usize) -> Result<(), Error> {
    if max_length < MIN_LABEL_LENGTH {
        return Err(Error::invalid_argument(format!(
            "max label length must be at least {MIN_LABEL_LENGTH}, got {max_length}"
        )));
    }
    Ok(())
}

pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
