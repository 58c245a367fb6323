use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pwmgen_client::message::encode_channel_list;
use pwmgen_client::{Frequency, Param, WaveKind};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

#[derive(Serialize)]
struct ChannelOutput {
    channel: usize,
    #[serde(flatten)]
    param: Param,
}

#[derive(Serialize)]
struct ParamsOutput {
    channels: Vec<ChannelOutput>,
}

pub fn print_params(params: &[Param], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ParamsOutput {
                channels: params
                    .iter()
                    .enumerate()
                    .map(|(channel, param)| ChannelOutput {
                        channel,
                        param: *param,
                    })
                    .collect(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["CH", "TYPE", "AVERAGE", "AMPLITUDE", "PERIOD", "START"]);
            for (channel, param) in params.iter().enumerate() {
                table.add_row(vec![
                    channel.to_string(),
                    param.kind.to_string(),
                    param.average.to_string(),
                    amount(param.kind, param.amplitude),
                    amount(param.kind, param.period),
                    amount(param.kind, param.start),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for param in params {
                println!("{param}");
            }
        }
        OutputFormat::Raw => {
            println!("{}", encode_channel_list((0u32..).zip(params)));
        }
    }
}

fn amount(kind: WaveKind, value: f64) -> String {
    if kind == WaveKind::Constant && value == 0.0 {
        "-".to_string()
    } else {
        value.to_string()
    }
}

pub fn print_frequency(frequency: &Frequency, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(frequency),
        OutputFormat::Table => {
            let mut table = new_table(vec!["MEAN (Hz)", "STD DEV"]);
            table.add_row(vec![frequency.mean.to_string(), frequency.std_dev.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "frequency: mean={} Hz stdDev={}",
            frequency.mean, frequency.std_dev
        ),
        OutputFormat::Raw => println!("{} {}", frequency.mean, frequency.std_dev),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_rows_flatten_params() {
        let row = ChannelOutput {
            channel: 2,
            param: Param::sinusoidal(0.5, 0.5, 1.0, 0.0),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["channel"], 2);
        assert_eq!(value["type"], "SIN");
        assert_eq!(value["period"], 1.0);
    }

    #[test]
    fn constant_channels_hide_unused_fields() {
        assert_eq!(amount(WaveKind::Constant, 0.0), "-");
        assert_eq!(amount(WaveKind::Triangular, 0.0), "0");
    }
}
