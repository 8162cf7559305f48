use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use custombet_terminal::config::PredictionConfig;
use custombet_terminal::error::user_message;
use custombet_terminal::gemini::{GeminiClient, PredictionSource};
use custombet_terminal::logging::init_stderr_logging;
use custombet_terminal::state::{DATE_FORMAT, PredictionBatch, local_today};

#[derive(Serialize)]
struct Output<'a> {
    date: String,
    model: &'a str,
    #[serde(flatten)]
    batch: &'a PredictionBatch,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let _ = init_stderr_logging();

    let date = match parse_date_arg()? {
        Some(date) => date,
        None => local_today(),
    };

    let config = PredictionConfig::from_env();
    let locale = config.locale;
    let client = GeminiClient::new(config).context("initialise prediction client")?;

    match client.fetch(date) {
        Ok(batch) => {
            let output = Output {
                date: date.format(DATE_FORMAT).to_string(),
                model: &client.config().model,
                batch: &batch,
            };
            let json = serde_json::to_string_pretty(&output).context("serialize predictions")?;
            println!("{json}");
            Ok(())
        }
        Err(err) => bail!("{}: {}", err.kind_code(), user_message(&err, locale)),
    }
}

fn parse_date_arg() -> Result<Option<NaiveDate>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        let raw = if let Some(value) = arg.strip_prefix("--date=") {
            value
        } else if arg == "--date" {
            let Some(next) = args.get(idx + 1) else {
                bail!("--date needs a value (YYYY-MM-DD)");
            };
            next.as_str()
        } else {
            continue;
        };
        let date = NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .with_context(|| format!("invalid --date '{raw}', expected YYYY-MM-DD"))?;
        return Ok(Some(date));
    }
    Ok(None)
}
