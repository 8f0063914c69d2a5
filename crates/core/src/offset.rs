use crate::error::Error;
use regex::Regex;
use std::sync::LazyLock;

static OFFSET_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]\d{2}(:\d{2})?$").expect("valid offset regex"));

static TRAILING_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]\d{2}:\d{2}$").expect("valid trailing offset regex"));

/// Checks an offset option value (`+09:00`, `-05`, ...) before any processing starts.
pub fn validate_offset_option(option: &'static str, value: &str) -> Result<(), Error> {
    if OFFSET_OPTION.is_match(value) {
        Ok(())
    } else {
        Err(Error::InvalidOffset {
            option,
            value: value.to_string(),
        })
    }
}

pub fn trailing_offset(raw: &str) -> Option<&str> {
    TRAILING_OFFSET.find(raw).map(|m| m.as_str())
}

pub fn strip_trailing_offset(raw: &str) -> &str {
    match TRAILING_OFFSET.find(raw) {
        Some(m) => &raw[..m.start()],
        None => raw,
    }
}
