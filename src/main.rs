use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

use sksim::config::{DEFAULT_MAX_TICKS, DEFAULT_NUM_PROCESSES};
use sksim::protocol::{Tick, DEFAULT_CS_DURATION};
use sksim::{ConfigError, Schedule, ScheduledRequest, SimConfig, Simulation, StopCondition};

/// Suzuki-Kasami mutual exclusion simulator
///
/// Runs the token-based protocol in discrete ticks and prints the event trace.
/// Without requests the built-in five-process scenario is used.
#[derive(Parser, Debug)]
#[command(name = "sk-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of processes
    #[arg(short = 'n', long, default_value_t = DEFAULT_NUM_PROCESSES)]
    processes: usize,

    /// Critical section duration in ticks
    #[arg(short = 'c', long, default_value_t = DEFAULT_CS_DURATION)]
    cs_duration: u32,

    /// Scheduled request as PID:TIME, repeatable
    #[arg(short = 'r', long = "request", value_name = "PID:TIME")]
    requests: Vec<ScheduledRequest>,

    /// Run exactly this many ticks instead of stopping at quiescence
    #[arg(long, conflicts_with = "max_ticks")]
    ticks: Option<Tick>,

    /// Safety limit when stopping at quiescence
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: Tick,

    /// Wall-clock pause after each tick, for following the trace live
    #[arg(long, default_value = "0")]
    tick_delay_ms: u64,

    /// Emit the trace as JSON lines
    #[arg(long)]
    json: bool,

    /// Positional form: NUM_PROCESSES NUM_REQUESTS PID TIME [PID TIME]...
    #[arg(value_name = "LEGACY", conflicts_with_all = ["requests", "processes"])]
    legacy: Vec<String>,
}

const LEGACY_USAGE: &str = "NUM_PROCESSES NUM_REQUESTS PID TIME [PID TIME]...";

/// Process count and schedule, from whichever form was given.
fn schedule_from(args: &Args) -> Result<(usize, Schedule), ConfigError> {
    if !args.legacy.is_empty() {
        // process count, request count and at least one pair
        if let [procs, flat @ ..] = args.legacy.as_slice() {
            if flat.len() >= 3 {
                let n = procs.trim().parse::<usize>().map_err(|e| ConfigError::ScheduleEntry {
                    entry: procs.clone(),
                    reason: format!("process count: {e}"),
                })?;
                let schedule = Schedule::from_flat(flat)?;
                if !schedule.is_empty() {
                    return Ok((n, schedule));
                }
            }
        }
        warn!("expected {LEGACY_USAGE}, using the default scenario");
        return default_scenario_for(DEFAULT_NUM_PROCESSES);
    }
    if !args.requests.is_empty() {
        return Ok((args.processes, Schedule::new(args.requests.clone())));
    }
    info!("no requests given, using the default scenario");
    default_scenario_for(args.processes)
}

fn default_scenario_for(num_processes: usize) -> Result<(usize, Schedule), ConfigError> {
    let schedule = Schedule::default_scenario();
    let needed = schedule.min_processes();
    if num_processes < needed {
        return Err(ConfigError::ScenarioTooSmall {
            needed,
            num_processes,
        });
    }
    Ok((num_processes, schedule))
}

fn main() -> ExitCode {
    // logging
    let env = Env::default()
        .filter_or("SK_LOG_LEVEL", "info")
        .write_style_or("SK_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let args = Args::parse();

    let stop = match args.ticks {
        Some(n) => StopCondition::Ticks(n),
        None => StopCondition::Quiescence {
            max_ticks: args.max_ticks,
        },
    };
    let built = schedule_from(&args).and_then(|(n, schedule)| {
        let config = SimConfig::new(n)
            .with_cs_duration(args.cs_duration)
            .with_tick_delay(Duration::from_millis(args.tick_delay_ms))
            .with_stop(stop);
        Simulation::new(config, schedule)
    });
    let mut sim = match built {
        Ok(sim) => sim,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let result = sim.run();

    if args.json {
        match sim.trace().to_json_lines() {
            Ok(lines) => print!("{lines}"),
            Err(e) => error!("could not encode trace: {e}"),
        }
    } else {
        for entry in sim.trace().entries() {
            println!("{entry}");
        }
    }

    match result {
        Ok(report) => {
            info!(
                "finished after {} ticks ({:?}), token at {:?}, {} CS entries",
                report.ticks,
                report.reason,
                report.final_holder,
                report.cs_entries.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
