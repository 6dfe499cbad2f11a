//! Initiator output protocol
//!
//! The initiator prints exactly three meaningful lines:
//!
//! 1. a banner naming the crypto runtime version,
//! 2. a confirmation that the provider was loaded,
//! 3. a comma-separated list of `duration:success` pairs, one per round.
//!
//! Any deviation means the tooling does not match this benchmark and the
//! whole run must stop.

use crate::error::{AppError, Result};
use crate::types::TrialOutcome;

/// Markers the first two output lines must contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolExpectations {
    pub version_marker: String,
    pub provider_marker: String,
}

impl ProtocolExpectations {
    pub fn new<V: Into<String>, P: Into<String>>(version_marker: V, provider_marker: P) -> Self {
        Self {
            version_marker: version_marker.into(),
            provider_marker: provider_marker.into(),
        }
    }
}

impl Default for ProtocolExpectations {
    fn default() -> Self {
        Self::new(
            crate::defaults::DEFAULT_EXPECTED_VERSION,
            crate::defaults::DEFAULT_PROVIDER_MARKER,
        )
    }
}

/// Validate initiator output and extract one outcome per round.
pub fn parse_initiator_output(
    output: &str,
    expectations: &ProtocolExpectations,
    batch_size: u32,
) -> Result<Vec<TrialOutcome>> {
    let mut lines = output.lines();

    let banner = lines.next().unwrap_or_default();
    if !banner.contains(&expectations.version_marker) {
        return Err(AppError::peer_version(format!(
            "expected '{}' on line 1, found '{}'",
            expectations.version_marker.trim(),
            banner.trim()
        )));
    }

    let provider = lines.next().unwrap_or_default();
    if !provider.contains(&expectations.provider_marker) {
        return Err(AppError::provider_not_loaded(format!(
            "expected '{}' on line 2, found '{}'",
            expectations.provider_marker,
            provider.trim()
        )));
    }

    let results = lines
        .next()
        .ok_or_else(|| AppError::malformed_output("missing result line"))?;

    let outcomes = results
        .trim()
        .split(',')
        .map(parse_pair)
        .collect::<Result<Vec<_>>>()?;

    if outcomes.len() != batch_size as usize {
        return Err(AppError::malformed_output(format!(
            "expected {} result pair(s), found {}",
            batch_size,
            outcomes.len()
        )));
    }

    Ok(outcomes)
}

/// Parse one `duration:success` pair
fn parse_pair(pair: &str) -> Result<TrialOutcome> {
    let pair = pair.trim();
    let (duration, success) = pair
        .split_once(':')
        .ok_or_else(|| AppError::malformed_output(format!("result '{}' is not a duration:success pair", pair)))?;

    let duration_ms: f64 = duration
        .trim()
        .parse()
        .map_err(|_| AppError::malformed_output(format!("invalid duration '{}'", duration)))?;
    if !duration_ms.is_finite() || duration_ms < 0.0 {
        return Err(AppError::malformed_output(format!("invalid duration '{}'", duration)));
    }

    let success = parse_success(success.trim())
        .ok_or_else(|| AppError::malformed_output(format!("invalid success token '{}'", success)))?;

    Ok(TrialOutcome::new(success, duration_ms))
}

fn parse_success(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER: &str = "OpenSSL 3.2.0 23 Nov 2023 (Library: OpenSSL 3.2.0 23 Nov 2023)";
    const PROVIDER: &str = "oqsprovider provider loaded successfully";

    fn output(results: &str) -> String {
        format!("{}\n{}\n{}\n", BANNER, PROVIDER, results)
    }

    #[test]
    fn test_parses_valid_batch() {
        let outcomes =
            parse_initiator_output(&output("12.5:true,0.0:false,9.75:true"), &ProtocolExpectations::default(), 3)
                .unwrap();
        assert_eq!(
            outcomes,
            vec![
                TrialOutcome::new(true, 12.5),
                TrialOutcome::failed(),
                TrialOutcome::new(true, 9.75)
            ]
        );
    }

    #[test]
    fn test_numeric_success_tokens() {
        let outcomes = parse_initiator_output(&output("3.0:1, 0.0:0"), &ProtocolExpectations::default(), 2).unwrap();
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
    }

    #[test]
    fn test_wrong_version_is_fatal() {
        let text = format!("OpenSSL 3.0.2 15 Mar 2022\n{}\n1.0:true\n", PROVIDER);
        let error = parse_initiator_output(&text, &ProtocolExpectations::default(), 1).unwrap_err();
        assert!(matches!(error, AppError::PeerVersion(_)));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_version_marker_needs_trailing_space() {
        // 3.2.0 must not match 3.2.01
        let text = format!("OpenSSL 3.2.01\n{}\n1.0:true\n", PROVIDER);
        assert!(parse_initiator_output(&text, &ProtocolExpectations::default(), 1).is_err());
    }

    #[test]
    fn test_missing_provider_is_fatal() {
        let text = format!("{}\nprovider failed to load\n1.0:true\n", BANNER);
        let error = parse_initiator_output(&text, &ProtocolExpectations::default(), 1).unwrap_err();
        assert!(matches!(error, AppError::ProviderNotLoaded(_)));
    }

    #[test]
    fn test_empty_output_is_version_error() {
        let error = parse_initiator_output("", &ProtocolExpectations::default(), 1).unwrap_err();
        assert!(matches!(error, AppError::PeerVersion(_)));
    }

    #[test]
    fn test_missing_result_line() {
        let text = format!("{}\n{}\n", BANNER, PROVIDER);
        let error = parse_initiator_output(&text, &ProtocolExpectations::default(), 1).unwrap_err();
        assert!(matches!(error, AppError::MalformedOutput(_)));
    }

    #[test]
    fn test_pair_count_must_match_batch() {
        let error =
            parse_initiator_output(&output("1.0:true,2.0:true"), &ProtocolExpectations::default(), 3).unwrap_err();
        assert!(matches!(error, AppError::MalformedOutput(_)));
        assert!(error.to_string().contains("expected 3"));
    }

    #[test]
    fn test_malformed_pairs() {
        for bad in ["1.0-true", "fast:true", "1.0:maybe", "-2.0:true", ""] {
            let result = parse_initiator_output(&output(bad), &ProtocolExpectations::default(), 1);
            assert!(
                matches!(result, Err(AppError::MalformedOutput(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_custom_markers() {
        let expectations = ProtocolExpectations::new("OpenSSL 3.3.1 ", "loaded");
        let text = "OpenSSL 3.3.1 4 Jun 2024\nloaded\n5.0:true\n";
        assert_eq!(parse_initiator_output(text, &expectations, 1).unwrap().len(), 1);
    }
}
