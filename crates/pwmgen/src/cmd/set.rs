use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pwmgen_client::{Param, WaveKind};
use serde::Deserialize;
use tracing::debug;

use crate::cmd::{finish, SetArgs};
use crate::exit::{generator_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_params, OutputFormat};

/// `{"channels": [{"channel": 0, ...}]}`, as printed by `params`.
#[derive(Deserialize)]
struct ChannelList {
    channels: Vec<ChannelEntry>,
}

#[derive(Deserialize)]
struct ChannelEntry {
    channel: u32,
    #[serde(flatten)]
    param: Param,
}

pub fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let wanted = collect_params(&args)?;
    for (channel, param) in &wanted {
        param
            .validate(*channel)
            .map_err(|err| generator_error("rejected configuration", err))?;
    }

    let mut generator = args.connect.open()?;
    let result = generator.set_parameters(&wanted);
    if let Some(count) = generator.channel_count() {
        debug!(channels = count, requested = wanted.len(), "set request sent");
    }
    let params = result.and_then(|()| generator.get_parameters());
    finish(generator);

    let params = params.map_err(|err| generator_error("set failed", err))?;
    print_params(&params, format);
    Ok(SUCCESS)
}

fn collect_params(args: &SetArgs) -> CliResult<BTreeMap<u32, Param>> {
    let mut wanted = match &args.file {
        Some(path) => read_file(path)?,
        None => BTreeMap::new(),
    };
    for spec in &args.channels {
        let (channel, param) = parse_channel_spec(spec)?;
        wanted.insert(channel, param);
    }
    if wanted.is_empty() {
        return Err(CliError::usage("no channels given; use --file or --channel"));
    }
    Ok(wanted)
}

fn read_file(path: &Path) -> CliResult<BTreeMap<u32, Param>> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    parse_channel_file(&text).map_err(|reason| {
        CliError::usage(format!("{} is not a channel file: {reason}", path.display()))
    })
}

/// Decode a channel file, either `{"0": {...}, "5": {...}}` or the
/// `{"channels": [...]}` layout printed by `params`.
fn parse_channel_file(text: &str) -> Result<BTreeMap<u32, Param>, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|err| err.to_string())?;

    if value.get("channels").is_some() {
        let list: ChannelList = serde_json::from_value(value).map_err(|err| err.to_string())?;
        return Ok(list
            .channels
            .into_iter()
            .map(|entry| (entry.channel, entry.param))
            .collect());
    }

    let map: BTreeMap<String, Param> =
        serde_json::from_value(value).map_err(|err| err.to_string())?;
    map.into_iter()
        .map(|(key, param)| match key.trim().parse::<u32>() {
            Ok(channel) => Ok((channel, param)),
            Err(_) => Err(format!("invalid channel key {key:?}")),
        })
        .collect()
}

/// Parse `CH:KIND:AVG` or `CH:KIND:AVG:AMP:PERIOD:START`.
fn parse_channel_spec(spec: &str) -> CliResult<(u32, Param)> {
    let invalid = |reason: &str| CliError::usage(format!("invalid --channel {spec:?}: {reason}"));

    let fields: Vec<&str> = spec.split(':').map(str::trim).collect();
    let (channel, kind, numbers) = match fields.as_slice() {
        [channel, kind, average] => (channel, kind, vec![*average]),
        [channel, kind, rest @ ..] if rest.len() == 4 => (channel, kind, rest.to_vec()),
        _ => return Err(invalid("expected CH:KIND:AVG[:AMP:PERIOD:START]")),
    };

    let channel: u32 = channel
        .parse()
        .map_err(|_| invalid("channel must be a non-negative integer"))?;
    let kind: WaveKind = kind
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| invalid("kind must be CST, SIN or TRI"))?;
    let numbers = numbers
        .iter()
        .map(|text| text.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("values must be numbers"))?;

    let param = match numbers.as_slice() {
        [average] => Param {
            kind,
            average: *average,
            ..Param::default()
        },
        [average, amplitude, period, start] => Param {
            kind,
            average: *average,
            amplitude: *amplitude,
            period: *period,
            start: *start,
        },
        _ => return Err(invalid("expected one or four values")),
    };
    Ok((channel, param))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_spec_is_constant_shape() {
        let (channel, param) = parse_channel_spec("0:CST:0.1").unwrap();
        assert_eq!(channel, 0);
        assert_eq!(param, Param::constant(0.1));
    }

    #[test]
    fn full_spec_sets_every_field() {
        let (channel, param) = parse_channel_spec("1:tri:0.5:0.5:0.003:0").unwrap();
        assert_eq!(channel, 1);
        assert_eq!(param, Param::triangular(0.5, 0.5, 0.003, 0.0));
    }

    #[test]
    fn malformed_specs_are_usage_errors() {
        for spec in ["0:CST", "x:CST:0.1", "0:SQR:0.1", "0:SIN:0.5:0.5", "0:CST:abc"] {
            let err = parse_channel_spec(spec).unwrap_err();
            assert_eq!(err.code, crate::exit::USAGE, "{spec}");
        }
    }

    #[test]
    fn channel_file_accepts_map_and_list() {
        let map = parse_channel_file(
            r#"{"2": {"type": "SIN", "average": 0.5, "amplitude": 0.5, "period": 1}}"#,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&2], Param::sinusoidal(0.5, 0.5, 1.0, 0.0));

        let list = parse_channel_file(
            r#"{"channels": [{"channel": 0, "type": "CST", "average": 0.1, "amplitude": 0, "period": 0, "start": 0}]}"#,
        )
        .unwrap();
        assert_eq!(list[&0], Param::constant(0.1));
    }

    #[test]
    fn channel_file_map_keeps_every_channel() {
        let map = parse_channel_file(
            r#"{"0": {"type": "CST", "average": 0.1}, "5": {"kind": "TRI", "average": 0.5, "amplitude": 0.5, "period": 0.003}}"#,
        )
        .unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(map[&0], Param::constant(0.1));
        assert_eq!(map[&5], Param::triangular(0.5, 0.5, 0.003, 0.0));
    }

    #[test]
    fn channel_file_rejects_bad_keys_and_shapes() {
        let err = parse_channel_file(r#"{"one": {"type": "CST", "average": 0.1}}"#).unwrap_err();
        assert!(err.contains("invalid channel key \"one\""), "{err}");

        assert!(parse_channel_file(r#"{"0": {"type": "SQR", "average": 0.1}}"#).is_err());
        assert!(parse_channel_file("[1, 2]").is_err());
        assert!(parse_channel_file("not json").is_err());
    }
}
