//! Display domains for URLs.

use url::Url;

use super::ExtractError;

/// Host of an absolute URL, with a leading `www.` removed.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidUrl`] if `input` does not parse as an
/// absolute URL or has no host.
pub fn domain_name(input: &str) -> Result<String, ExtractError> {
    let url = Url::parse(input.trim()).map_err(|e| ExtractError::InvalidUrl(format!("{input}: {e}")))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ExtractError::InvalidUrl(format!("{input}: missing host")))?;

    Ok(host.strip_prefix("www.").unwrap_or(host).to_string())
}
