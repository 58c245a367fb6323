//! Request texts and payload decoding for the generator exchanges.
//!
//! The channel list shared by `GPRM` replies and `SPRM` requests:
//!
//! ```text
//! <n>, <ch> <KIND> <avg> <amp> <period> <start>[, <ch> ...]
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::error::PayloadError;
use crate::param::{Param, WaveKind};

/// Greeting request.
pub const GREETING: &str = "PWM0";
/// Prefix of a successful greeting payload.
pub const GREETING_PREFIX: &str = "HELO ";
/// Get-parameters request.
pub const GET_PARAMS: &str = "GPRM";
/// Set-parameters request keyword.
pub const SET_PARAMS: &str = "SPRM";
/// Frequency request.
pub const FREQUENCY: &str = "FREQ";
/// Payload acknowledging a set-parameters request.
pub const SET_ACK: &str = "DONE";

/// Pulse generation frequency reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Frequency {
    /// Mean pulse frequency in Hz.
    pub mean: f64,
    /// Standard deviation of the pulse frequency.
    pub std_dev: f64,
}

/// Identification text from the greeting, split into its usual parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// The greeting remainder as received.
    pub raw: String,
    /// Leading token when it looks like `v<digits>...`.
    pub firmware_version: Option<String>,
    /// Resolution from a `<n>bits` token.
    pub resolution_bits: Option<u32>,
}

impl DeviceIdentity {
    /// Split a greeting remainder such as `v0.1.1 12bits`.
    ///
    /// Unknown layouts are kept in `raw` with the parsed parts left empty.
    pub fn parse(raw: &str) -> Self {
        let mut firmware_version = None;
        let mut resolution_bits = None;
        for token in raw.split_whitespace() {
            if let Some(bits) = token.strip_suffix("bits") {
                if let Ok(bits) = bits.parse() {
                    resolution_bits.get_or_insert(bits);
                    continue;
                }
            }
            let versioned = token
                .strip_prefix('v')
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()));
            if versioned && firmware_version.is_none() {
                firmware_version = Some(token.to_string());
            }
        }
        Self {
            raw: raw.to_string(),
            firmware_version,
            resolution_bits,
        }
    }
}

/// Device identification from a greeting payload, if it has the `HELO `
/// prefix. Surrounding spaces are trimmed.
pub fn parse_greeting(payload: &[u8]) -> Option<String> {
    let rest = payload.strip_prefix(GREETING_PREFIX.as_bytes())?;
    Some(String::from_utf8_lossy(rest).trim().to_string())
}

/// Build the `SPRM` request for `params`, ascending channel order.
pub fn encode_set_params(params: &BTreeMap<u32, Param>) -> String {
    let list = encode_channel_list(params.iter().map(|(channel, param)| (*channel, param)));
    format!("{SET_PARAMS} {list}")
}

/// Encode entries as a channel list, count first.
pub fn encode_channel_list<'a>(entries: impl IntoIterator<Item = (u32, &'a Param)>) -> String {
    let mut body = String::new();
    let mut count = 0usize;
    for (channel, param) in entries {
        // Writing into a String cannot fail.
        let _ = write!(
            body,
            ", {channel} {} {} {} {} {}",
            param.kind, param.average, param.amplitude, param.period, param.start
        );
        count += 1;
    }
    format!("{count}{body}")
}

/// Decode a channel list into `(channel, param)` entries in wire order.
///
/// The declared count must match the number of entries.
pub fn parse_channel_list(text: &str) -> Result<Vec<(u32, Param)>, PayloadError> {
    let mut parts = text.split(',');
    let count_text = parts
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(PayloadError::MissingCount)?;
    let count: usize = count_text.parse().map_err(|source| PayloadError::BadCount {
        text: count_text.to_string(),
        source,
    })?;

    let entries = parts
        .enumerate()
        .map(|(entry, part)| parse_entry(entry, part))
        .collect::<Result<Vec<_>, _>>()?;

    if entries.len() != count {
        return Err(PayloadError::CountMismatch {
            expected: count,
            found: entries.len(),
        });
    }
    Ok(entries)
}

fn parse_entry(entry: usize, part: &str) -> Result<(u32, Param), PayloadError> {
    let fields: Vec<&str> = part.split_whitespace().collect();
    let [channel, kind, average, amplitude, period, start] = fields.as_slice() else {
        return Err(PayloadError::FieldCount {
            entry,
            found: fields.len(),
        });
    };
    let channel = channel.parse().map_err(|source| PayloadError::BadChannel {
        entry,
        text: channel.to_string(),
        source,
    })?;
    let param = Param {
        kind: kind.parse::<WaveKind>()?,
        average: parse_number("average", average)?,
        amplitude: parse_number("amplitude", amplitude)?,
        period: parse_number("period", period)?,
        start: parse_number("start", start)?,
    };
    Ok((channel, param))
}

/// Decode a `GPRM` payload into one `Param` per channel.
///
/// Slots are filled in reply order; the index carried by each entry is
/// parsed but not checked against its position.
pub fn parse_params(payload: &[u8]) -> Result<Vec<Param>, PayloadError> {
    let text = std::str::from_utf8(payload)?;
    Ok(parse_channel_list(text)?
        .into_iter()
        .map(|(_, param)| param)
        .collect())
}

/// Decode a `FREQ` payload: exactly two reals.
pub fn parse_frequency(payload: &[u8]) -> Result<Frequency, PayloadError> {
    let text = std::str::from_utf8(payload)?;
    let values: Vec<&str> = text.split_whitespace().collect();
    let [mean, std_dev] = values.as_slice() else {
        return Err(PayloadError::ValueCount {
            expected: 2,
            found: values.len(),
        });
    };
    Ok(Frequency {
        mean: parse_number("mean", mean)?,
        std_dev: parse_number("standard deviation", std_dev)?,
    })
}

/// Check a `SPRM` reply payload.
pub fn check_set_ack(payload: &[u8]) -> Result<(), PayloadError> {
    if payload == SET_ACK.as_bytes() {
        Ok(())
    } else {
        Err(PayloadError::UnexpectedAck(
            String::from_utf8_lossy(payload).into_owned(),
        ))
    }
}

fn parse_number(field: &'static str, text: &str) -> Result<f64, PayloadError> {
    text.parse().map_err(|source| PayloadError::BadNumber {
        field,
        text: text.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_prefix_is_required() {
        assert_eq!(
            parse_greeting(b"HELO unit-test-device").as_deref(),
            Some("unit-test-device")
        );
        assert_eq!(parse_greeting(b"HELO  v0.1.1 12bits ").as_deref(), Some("v0.1.1 12bits"));
        assert_eq!(parse_greeting(b"HELLO there"), None);
        assert_eq!(parse_greeting(b"HELO"), None);
    }

    #[test]
    fn identity_splits_version_and_resolution() {
        let id = DeviceIdentity::parse("v0.1.1 12bits");
        assert_eq!(id.firmware_version.as_deref(), Some("v0.1.1"));
        assert_eq!(id.resolution_bits, Some(12));

        let id = DeviceIdentity::parse("unit-test-device");
        assert_eq!(id.raw, "unit-test-device");
        assert_eq!(id.firmware_version, None);
        assert_eq!(id.resolution_bits, None);
    }

    #[test]
    fn two_channel_params_decode() {
        let params = parse_params(b"2, 0 CST 0.1 0 0 0, 1 SIN 0.5 0.5 1 0").unwrap();
        assert_eq!(
            params,
            vec![Param::constant(0.1), Param::sinusoidal(0.5, 0.5, 1.0, 0.0)]
        );
    }

    #[test]
    fn scientific_notation_is_accepted() {
        let params = parse_params(b"1, 0 TRI 0.5 0.5 0.003 1e-05").unwrap();
        assert_eq!(params[0], Param::triangular(0.5, 0.5, 0.003, 1e-5));
    }

    #[test]
    fn zero_channels_decode_to_empty_list() {
        assert!(parse_params(b"0").unwrap().is_empty());
    }

    #[test]
    fn count_mismatch_is_rejected() {
        assert!(matches!(
            parse_params(b"3, 0 CST 0.1 0 0 0"),
            Err(PayloadError::CountMismatch {
                expected: 3,
                found: 1
            })
        ));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(matches!(
            parse_params(b"1, 0 SQR 0.1 0 0 0"),
            Err(PayloadError::UnknownKind(kind)) if kind == "SQR"
        ));
        assert!(matches!(
            parse_params(b"1, 0 CST 0.1 0 0"),
            Err(PayloadError::FieldCount { entry: 0, found: 5 })
        ));
        assert!(matches!(
            parse_params(b"1, 0 CST abc 0 0 0"),
            Err(PayloadError::BadNumber { field: "average", .. })
        ));
        assert!(matches!(parse_params(b""), Err(PayloadError::MissingCount)));
        assert!(matches!(
            parse_params(b"two, 0 CST 0.1 0 0 0"),
            Err(PayloadError::BadCount { .. })
        ));
    }

    #[test]
    fn params_follow_reply_order() {
        let params = parse_params(b"2, 1 CST 0.1 0 0 0, 0 CST 0.2 0 0 0").unwrap();
        assert_eq!(params, vec![Param::constant(0.1), Param::constant(0.2)]);
    }

    #[test]
    fn set_request_lists_channels_ascending() {
        let mut params = BTreeMap::new();
        params.insert(5, Param::triangular(0.5, 0.5, 0.003, 0.0));
        params.insert(0, Param::constant(0.1));
        assert_eq!(
            encode_set_params(&params),
            "SPRM 2, 0 CST 0.1 0 0 0, 5 TRI 0.5 0.5 0.003 0"
        );
    }

    #[test]
    fn set_request_parses_back() {
        let mut params = BTreeMap::new();
        params.insert(1, Param::sinusoidal(0.25, 0.125, 2.5, 0.75));
        params.insert(3, Param::constant(1.0 / 3.0));
        let request = encode_set_params(&params);
        let args = request.strip_prefix("SPRM ").unwrap();
        let decoded: BTreeMap<u32, Param> = parse_channel_list(args).unwrap().into_iter().collect();
        assert_eq!(decoded, params);
    }

    #[test]
    fn frequency_needs_exactly_two_values() {
        assert_eq!(
            parse_frequency(b"440.0 0.5").unwrap(),
            Frequency {
                mean: 440.0,
                std_dev: 0.5
            }
        );
        assert!(matches!(
            parse_frequency(b"440.0"),
            Err(PayloadError::ValueCount {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            parse_frequency(b"440 0.5 1"),
            Err(PayloadError::ValueCount { found: 3, .. })
        ));
        assert!(matches!(
            parse_frequency(b"fast 0.5"),
            Err(PayloadError::BadNumber { field: "mean", .. })
        ));
    }

    #[test]
    fn set_ack_must_be_done() {
        check_set_ack(b"DONE").unwrap();
        assert!(matches!(
            check_set_ack(b"DONE!"),
            Err(PayloadError::UnexpectedAck(text)) if text == "DONE!"
        ));
    }
}
