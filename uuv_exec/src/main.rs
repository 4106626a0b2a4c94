//! Main UUV executable entry point.
//!
//! # Architecture
//!
//! The executable resolves its configuration, then hands a vehicle link and a marker source to
//! the orchestrator, which runs:
//!
//!     - Connect to and arm the vehicle
//!     - Control loop, once per cycle until cancelled:
//!         - Marker observation acquisition
//!         - Axis control processing
//!         - Command dispatch
//!         - Run log record
//!     - Neutral command, override release, disarm and disconnect
//!
//! The run is cancelled by entering `q` on stdin, or after `--duration` seconds.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::{
    io::{self, BufRead, IsTerminal},
    path::PathBuf,
    thread,
    time::Duration,
};
use structopt::StructOpt;

// Internal
use uuv_lib::{
    axis_ctrl::{AxisCtrlParams, AxisCtrls},
    cancel::CancelToken,
    link::{BridgeLink, SimLink, VehicleLink},
    orch::Orchestrator,
    params::{LinkKind, UuvExecParams},
    run_log::RunLog,
    vision_client::{MarkerSource, ReplaySource, VisionClient},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    params::{self, LoadError},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Stabilise the vehicle against a fiducial marker.
#[derive(Debug, StructOpt)]
#[structopt(name = "uuv_exec")]
struct Opts {
    /// Use the simulated link whatever the parameters say
    #[structopt(long)]
    sim: bool,

    /// Play back recorded observations from this file instead of the live vision feed
    #[structopt(long, parse(from_os_str))]
    replay: Option<PathBuf>,

    /// Stop the run after this many seconds
    #[structopt(long)]
    duration: Option<f64>,

    /// Load parameters from this directory instead of `{root}/params`
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Print debug output
    #[structopt(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- LOAD PARAMETERS ----

    let mut exec_params: UuvExecParams =
        load_params(&opts, "uuv_exec.toml").wrap_err("Could not load exec params")?;
    let axis_params: AxisCtrlParams =
        load_params(&opts, "axis_ctrl.toml").wrap_err("Could not load axis control params")?;

    if opts.sim {
        exec_params.link = LinkKind::Simulated;
    }

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("uuv_exec", "sessions", exec_params.link.tag())
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = match opts.verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("UUV Stabilisation Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);
    debug!("Options: {:?}", opts);
    debug!("Exec parameters: {:?}", exec_params);

    exec_params
        .validate()
        .wrap_err("Invalid exec parameters")?;

    // ---- INITIALISE MODULES ----

    let ctrls = AxisCtrls::new(&axis_params).wrap_err("Failed to initialise AxisCtrl")?;
    info!("AxisCtrl init complete");

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let link: Box<dyn VehicleLink> = match exec_params.link {
        LinkKind::Hardware => Box::new(BridgeLink::new(zmq_ctx.clone(), exec_params.force_arm)),
        LinkKind::Simulated => {
            let colour = io::stdout().is_terminal();
            Box::new(SimLink::new(io::stdout(), colour))
        }
    };
    info!("Using the {:?} vehicle link", exec_params.link);

    let vision: Box<dyn MarkerSource> = match opts.replay {
        Some(ref path) => {
            let src = ReplaySource::new(path).wrap_err("Failed to load the replay")?;
            info!(
                "Replaying {} observations from {:?}",
                src.remaining(),
                src.path()
            );
            Box::new(src)
        }
        None => {
            let c = VisionClient::new(
                &zmq_ctx,
                &exec_params.vision_endpoint,
                exec_params.vision_stale_after_s,
            )
            .wrap_err("Failed to initialise VisionClient")?;
            info!("VisionClient initialised");
            Box::new(c)
        }
    };

    // ---- CANCELLATION ----

    let cancel = CancelToken::new();
    spawn_stdin_watcher(cancel.clone());

    if let Some(secs) = opts.duration {
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|_| eyre!("Invalid run duration: {}", secs))?;
        spawn_timer(cancel.clone(), duration);
        info!("Run will stop after {:.1} s", secs);
    }

    // ---- RUN ----

    let mut run_log =
        RunLog::open(&session.log_file_path).wrap_err("Failed to open the run log")?;

    info!("Starting the run, enter `q` to stop\n");

    let mut orch = Orchestrator::new(link, vision, ctrls, &exec_params)
        .wrap_err("Invalid executable parameters")?;
    let result = orch.run(&cancel, &mut run_log);

    if run_log.write_failures() > 0 {
        warn!(
            "{} events could not be written to the run log",
            run_log.write_failures()
        );
    }

    session.exit();

    let summary = result.wrap_err("Run aborted during startup")?;

    info!(
        "{} cycles, {} without a marker, {} dispatch failures, {} vision faults, {} shutdown failures",
        summary.ticks,
        summary.marker_absent_ticks,
        summary.dispatch_failures,
        summary.vision_faults,
        summary.shutdown_failures
    );

    Ok(())
}

/// Load a parameter file from the directory given on the command line, or the default one.
fn load_params<P: serde::de::DeserializeOwned>(opts: &Opts, file: &str) -> Result<P, LoadError> {
    match opts.params {
        Some(ref dir) => params::load_from(dir, file),
        None => params::load(file),
    }
}

/// Cancel the run when `q` is entered on stdin.
fn spawn_stdin_watcher(cancel: CancelToken) {
    thread::spawn(move || {
        let stdin = io::stdin();

        for line in stdin.lock().lines() {
            match line {
                Ok(l) if l.trim().eq_ignore_ascii_case("q") => {
                    info!("Stop requested");
                    cancel.cancel();
                    break;
                }
                Ok(_) => (),
                Err(_) => break,
            }
        }

        // End of input only stops watching
        debug!("Stopped watching stdin");
    });
}

/// Cancel the run after `duration`.
fn spawn_timer(cancel: CancelToken, duration: Duration) {
    thread::spawn(move || {
        thread::sleep(duration);
        info!("Run duration elapsed");
        cancel.cancel();
    });
}
