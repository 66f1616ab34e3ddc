use clap::{Parser, ValueEnum};
use serde_json::{Map, Value};
use std::{io::Read, str::FromStr};

use wsstack_demos::helpers::init_logger;
use wsstack_session::{LegacyReader, Reader, SerializedReader, SessionValue};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Legacy,
    Serialized,
}

#[derive(Parser)]
#[command(name = "Session Inspect")]
#[command(version = "0.0.0")]
#[command(about = "Decodes a stored session blob and prints it as JSON", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(long, value_enum, default_value_t = Format::Legacy)]
    format: Format,
    /// Session blob; read from stdin when omitted
    blob: Option<String>,
}

fn to_json(value: &SessionValue) -> Value {
    match value {
        SessionValue::Null => Value::Null,
        SessionValue::Bool(b) => Value::Bool(*b),
        SessionValue::Int(i) => Value::from(*i),
        SessionValue::Float(f) => Value::from(*f),
        SessionValue::String(s) => Value::String(s.clone()),
        SessionValue::Array(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), to_json(value)))
                .collect::<Map<_, _>>(),
        ),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        init_logger(log_level);
    }

    let blob = match cli.blob {
        Some(blob) => blob.into_bytes(),
        None => {
            let mut blob = Vec::new();
            std::io::stdin().read_to_end(&mut blob)?;
            blob
        }
    };

    let data = match cli.format {
        Format::Legacy => LegacyReader.read(&blob)?,
        Format::Serialized => SerializedReader.read(&blob)?,
    };

    let json: Map<_, _> = data
        .iter()
        .map(|(name, value)| (name.clone(), to_json(value)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&json)?);

    Ok(())
}
