use crate::prelude::*;
use clap::ArgMatches;
use serde::Serialize;
use std::time::Duration;

fn to_json<T: Serialize>(value: &T, pretty: bool) -> DaResult<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

pub fn run(args: &ArgMatches) -> DaResult<()> {
    init_logger(args);

    let bytes = read_input(args)?;
    let mut options = AnalysisOptions::new();
    if let Some(locale) = args.get_one::<String>("locale") {
        options = options.with_locale(locale)?;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        options = options.with_cancel(CancelToken::with_timeout(Duration::from_secs(*timeout)));
    }
    let pretty = args.get_flag("pretty");

    match analyze(&bytes, &options) {
        Ok(report) => {
            for warning in report.warnings() {
                log::warn!("{warning}");
            }
            match report.status() {
                Status::Complete => log::info!("analysis complete"),
                Status::Degraded => log::warn!(
                    "analysis degraded with {} warnings",
                    report.warnings().len()
                ),
                Status::Cancelled => log::warn!("analysis cancelled, report is partial"),
            }
            log::info!("{} findings", report.findings().len());
            write_output(args, &to_json(&report, pretty)?)
        }
        Err(err) => {
            log::error!("no report: {err}");
            let error = serde_json::json!({ "error": err.to_string() });
            write_output(args, &to_json(&error, pretty)?)?;
            Err(err.into())
        }
    }
}
