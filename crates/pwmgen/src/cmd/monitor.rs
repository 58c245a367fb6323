use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pwmgen_client::Frequency;
use serde::Serialize;
use tracing::info;

use crate::cmd::{finish, parse_duration, MonitorArgs};
use crate::exit::{generator_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_frequency, print_json, OutputFormat};

const POLL_STEP: Duration = Duration::from_millis(100);

#[derive(Serialize)]
struct SampleOutput {
    sample: usize,
    #[serde(flatten)]
    frequency: Frequency,
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut generator = args.connect.open()?;
    let mut taken = 0usize;
    let outcome = loop {
        let frequency = match generator.get_frequency() {
            Ok(frequency) => frequency,
            Err(err) => break Err(generator_error("frequency query failed", err)),
        };
        taken += 1;
        match format {
            OutputFormat::Json => print_json(&SampleOutput {
                sample: taken,
                frequency,
            }),
            other => print_frequency(&frequency, other),
        }

        if args.count.is_some_and(|count| taken >= count) {
            break Ok(SUCCESS);
        }
        if !sleep_while_running(interval, &running) {
            info!(samples = taken, "interrupted");
            break Ok(SUCCESS);
        }
    };

    finish(generator);
    outcome
}

/// Sleep for `duration` in short steps. Returns false once `running` is
/// cleared.
fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(POLL_STEP.min(deadline - now));
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_stops_when_cleared() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_while_running(Duration::from_secs(5), &running));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_runs_to_deadline() {
        let running = AtomicBool::new(true);
        assert!(sleep_while_running(Duration::from_millis(20), &running));
    }
}
