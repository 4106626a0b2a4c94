//! Implementations for the Orchestrator state structure

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::{
    io::Write,
    thread,
    time::{Duration, Instant},
};

use comms_if::eqpt::MarkerObservation;

use super::{OrchError, OrchState, RunSummary, ShutdownStep};
use crate::{
    axis_ctrl::{AxisCtrls, FrameReport},
    cancel::CancelToken,
    link::VehicleLink,
    params::{UuvExecParams, UuvExecParamsError},
    run_log::{RunEvent, RunLog},
    vision_client::{MarkerSource, VisionError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Drives one stabilisation run over a vehicle link `L` with observations from `V`.
pub struct Orchestrator<L: VehicleLink, V: MarkerSource> {
    state: OrchState,

    link: L,

    vision: V,

    ctrls: AxisCtrls,

    endpoint: String,

    cycle_period: Duration,

    max_consec_vision_errors: u32,

    consec_vision_errors: u32,

    /// Start of the previous cycle, `None` before the first one
    last_tick: Option<Instant>,

    last_report: FrameReport,

    summary: RunSummary,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What the loop should do after a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Continue,

    /// Leave the loop, for the given reason
    Stop(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<L: VehicleLink, V: MarkerSource> Orchestrator<L, V> {
    /// Create the orchestrator, checking the parameters first.
    pub fn new(
        link: L,
        vision: V,
        ctrls: AxisCtrls,
        params: &UuvExecParams,
    ) -> Result<Self, UuvExecParamsError> {
        params.validate()?;

        Ok(Self {
            state: OrchState::Init,
            link,
            vision,
            ctrls,
            endpoint: params.link_endpoint.clone(),
            cycle_period: Duration::try_from_secs_f64(params.cycle_period_s).map_err(|_| {
                UuvExecParamsError::NotPositive("cycle_period_s", params.cycle_period_s)
            })?,
            max_consec_vision_errors: params.max_consec_vision_errors,
            consec_vision_errors: 0,
            last_tick: None,
            last_report: FrameReport::default(),
            summary: RunSummary::default(),
        })
    }

    /// Execute the run.
    ///
    /// Returns once the run reaches `TERMINATED`, at which point the run log has been closed. The
    /// run stops when `cancel` is set, when the marker source ends or when it has failed too many
    /// times in a row. A startup failure is returned as an error after the shutdown sequence has
    /// been attempted.
    pub fn run<W: Write>(
        &mut self,
        cancel: &CancelToken,
        log: &mut RunLog<W>,
    ) -> Result<RunSummary, OrchError> {
        self.ctrls.reset();

        if let Err(e) = self.start(log) {
            // Arming only happens on a connected link, which must then be released
            let established = matches!(e, OrchError::LinkArm(_));

            self.transition(OrchState::Error, log);
            self.transition(OrchState::ShuttingDown, log);
            self.shutdown(established, log);
            self.finish(log);

            return Err(e);
        }

        loop {
            if cancel.is_cancelled() {
                log.record(RunEvent::Stopping {
                    reason: "cancelled".into(),
                });
                break;
            }

            let cycle_start = Instant::now();

            if let TickOutcome::Stop(reason) = self.step(log) {
                log.record(RunEvent::Stopping { reason });
                break;
            }

            self.pace(cycle_start);
        }

        self.transition(OrchState::ShuttingDown, log);
        self.shutdown(true, log);
        self.finish(log);

        Ok(self.summary)
    }

    /// Run a single control cycle: observe, compute, dispatch, log.
    pub fn step<W: Write>(&mut self, log: &mut RunLog<W>) -> TickOutcome {
        let now = Instant::now();
        let dt_s = match self.last_tick {
            Some(t) => now.duration_since(t).as_secs_f64(),
            None => 0.0,
        };
        self.last_tick = Some(now);

        let observation = match self.vision.observe() {
            Ok(obs) => {
                self.consec_vision_errors = 0;
                obs
            }
            Err(VisionError::EndOfReplay) => {
                return TickOutcome::Stop("end of the replay".into());
            }
            Err(e) => {
                self.summary.vision_faults += 1;
                self.consec_vision_errors += 1;

                log.record(RunEvent::VisionFault {
                    consecutive: self.consec_vision_errors,
                    error: e.to_string(),
                });

                if self.consec_vision_errors >= self.max_consec_vision_errors {
                    return TickOutcome::Stop(format!(
                        "{} consecutive vision faults",
                        self.consec_vision_errors
                    ));
                }

                MarkerObservation::absent()
            }
        };

        self.summary.ticks += 1;
        if !observation.present {
            self.summary.marker_absent_ticks += 1;
        }

        let (frame, report) = self.ctrls.compute_frame(&observation, dt_s);
        self.last_report = report;

        if let Err(e) = self.link.dispatch(&frame) {
            self.summary.dispatch_failures += 1;
            log.record(RunEvent::DispatchFault {
                tick: self.summary.ticks,
                error: e.to_string(),
            });
        }

        log.record(RunEvent::Tick {
            tick: self.summary.ticks,
            dt_s,
            marker_present: observation.present,
            frame,
        });

        TickOutcome::Continue
    }

    pub fn state(&self) -> OrchState {
        self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Per-axis status of the latest cycle.
    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    /// Connect and arm, leaving the orchestrator in `RUNNING` on success.
    fn start<W: Write>(&mut self, log: &mut RunLog<W>) -> Result<(), OrchError> {
        self.transition(OrchState::Connecting, log);

        let res = self.link.connect(&self.endpoint);
        log.record(RunEvent::Connect {
            endpoint: self.endpoint.clone(),
            error: res.as_ref().err().map(|e| e.to_string()),
        });
        res.map_err(OrchError::LinkConnect)?;

        self.transition(OrchState::Arming, log);

        let res = self.link.arm();
        log.record(RunEvent::Arm {
            error: res.as_ref().err().map(|e| e.to_string()),
        });
        res.map_err(OrchError::LinkArm)?;

        self.transition(OrchState::Running, log);

        Ok(())
    }

    /// Run every shutdown step in order, whatever the earlier ones returned.
    ///
    /// If the link was never established there is nothing to shut down and no step is attempted.
    fn shutdown<W: Write>(&mut self, established: bool, log: &mut RunLog<W>) {
        if !established {
            log.record(RunEvent::ShutdownSkipped {
                reason: "the link was never connected".into(),
            });
            return;
        }

        let neutral = self.ctrls.neutral_frame();
        self.ctrls.reset();

        for step in ShutdownStep::ALL.iter() {
            let res = match step {
                ShutdownStep::NeutralFrame => self.link.dispatch(&neutral),
                ShutdownStep::ResetOverride => self.link.reset_override(),
                ShutdownStep::Disarm => self.link.disarm(),
                ShutdownStep::Disconnect => self.link.disconnect(),
            };

            if res.is_err() {
                self.summary.shutdown_failures += 1;
            }

            log.record(RunEvent::Shutdown {
                step: *step,
                error: res.err().map(|e| e.to_string()),
            });
        }
    }

    fn finish<W: Write>(&mut self, log: &mut RunLog<W>) {
        self.transition(OrchState::Terminated, log);
        self.summary.final_state = self.state;

        log.record(RunEvent::Summary(self.summary));
        log.close();

        info!("Run terminated after {} cycles", self.summary.ticks);
    }

    fn transition<W: Write>(&mut self, to: OrchState, log: &mut RunLog<W>) {
        log.record(RunEvent::Transition(self.state, to));
        self.state = to;
    }

    /// Sleep for the rest of the cycle.
    fn pace(&self, cycle_start: Instant) {
        let cycle_dur = Instant::now() - cycle_start;

        match self.cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - self.cycle_period.as_secs_f64()
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{axis_ctrl::AxisCtrlParams, link::LinkError};
    use comms_if::eqpt::{Axis, ControlFrame, PWM_NEUTRAL};
    use std::collections::VecDeque;

    /// Link recording every call, failing the ones named in `fail`.
    #[derive(Default)]
    struct MockLink {
        calls: Vec<&'static str>,
        frames: Vec<ControlFrame>,
        fail: Vec<&'static str>,
    }

    impl MockLink {
        fn failing(fail: &[&'static str]) -> Self {
            Self {
                fail: fail.to_vec(),
                ..Default::default()
            }
        }

        fn call(&mut self, name: &'static str) -> Result<(), LinkError> {
            self.calls.push(name);
            match self.fail.contains(&name) {
                true => Err(LinkError::Rejected(name, "mock failure".into())),
                false => Ok(()),
            }
        }

        fn count(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| **c == name).count()
        }
    }

    impl VehicleLink for MockLink {
        fn connect(&mut self, _endpoint: &str) -> Result<(), LinkError> {
            self.call("connect")
        }

        fn arm(&mut self) -> Result<(), LinkError> {
            self.call("arm")
        }

        fn dispatch(&mut self, frame: &ControlFrame) -> Result<(), LinkError> {
            self.frames.push(*frame);
            self.call("dispatch")
        }

        fn reset_override(&mut self) -> Result<(), LinkError> {
            self.call("reset_override")
        }

        fn disarm(&mut self) -> Result<(), LinkError> {
            self.call("disarm")
        }

        fn disconnect(&mut self) -> Result<(), LinkError> {
            self.call("disconnect")
        }
    }

    /// Source playing back a fixed script of results, then ending.
    struct MockSource(VecDeque<Result<MarkerObservation, VisionError>>);

    impl MarkerSource for MockSource {
        fn observe(&mut self) -> Result<MarkerObservation, VisionError> {
            self.0.pop_front().unwrap_or(Err(VisionError::EndOfReplay))
        }
    }

    fn offset_marker() -> MarkerObservation {
        MarkerObservation {
            present: true,
            area: 15_000.0,
            left_edge_length: 120.0,
            right_edge_length: 130.0,
            center_x: 400.0,
            center_y: 300.0,
            frame_width: 640,
            frame_height: 480,
        }
    }

    fn markers(n: usize) -> Vec<Result<MarkerObservation, VisionError>> {
        (0..n).map(|_| Ok(offset_marker())).collect()
    }

    fn orch(
        link: MockLink,
        script: Vec<Result<MarkerObservation, VisionError>>,
    ) -> Orchestrator<MockLink, MockSource> {
        let params = UuvExecParams {
            cycle_period_s: 0.001,
            max_consec_vision_errors: 3,
            ..Default::default()
        };

        Orchestrator::new(
            link,
            MockSource(script.into()),
            AxisCtrls::new(&AxisCtrlParams::default()).unwrap(),
            &params,
        )
        .unwrap()
    }

    fn run(o: &mut Orchestrator<MockLink, MockSource>) -> (Result<RunSummary, OrchError>, String) {
        let mut log = RunLog::from_writer(Vec::new());
        let res = o.run(&CancelToken::new(), &mut log);
        assert!(log.is_closed());
        (res, String::from_utf8(log.into_inner()).unwrap())
    }

    #[test]
    fn test_invalid_cycle_period_is_refused() {
        for period in [0.0, -1.0, std::f64::NAN, std::f64::INFINITY].iter() {
            let params = UuvExecParams {
                cycle_period_s: *period,
                ..Default::default()
            };

            let res = Orchestrator::new(
                MockLink::default(),
                MockSource(VecDeque::new()),
                AxisCtrls::new(&AxisCtrlParams::default()).unwrap(),
                &params,
            );

            assert!(matches!(
                res,
                Err(UuvExecParamsError::NotPositive("cycle_period_s", _))
            ));
        }
    }

    #[test]
    fn test_normal_run_and_shutdown_order() {
        let mut o = orch(MockLink::default(), markers(3));

        let (res, text) = run(&mut o);
        let summary = res.unwrap();

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.final_state, OrchState::Terminated);
        assert_eq!(o.state(), OrchState::Terminated);
        assert_eq!(
            o.link().calls,
            vec![
                "connect",
                "arm",
                "dispatch",
                "dispatch",
                "dispatch",
                "dispatch",
                "reset_override",
                "disarm",
                "disconnect"
            ]
        );

        // Last frame sent is the neutral one from the shutdown
        let frames = &o.link().frames;
        assert!(!frames[0].is_neutral());
        assert!(frames[3].is_neutral());

        assert!(text.contains("STATE ARMING -> RUNNING"));
        assert!(text.contains("STOPPING end of the replay"));
        assert!(text.contains("STATE SHUTTING_DOWN -> TERMINATED"));
    }

    #[test]
    fn test_disarm_failure_still_disconnects() {
        let mut o = orch(MockLink::failing(&["disarm"]), vec![Ok(offset_marker())]);

        let (res, text) = run(&mut o);
        let summary = res.unwrap();

        assert_eq!(o.link().count("disconnect"), 1);
        assert_eq!(o.link().calls.last(), Some(&"disconnect"));
        assert_eq!(summary.shutdown_failures, 1);
        assert_eq!(summary.final_state, OrchState::Terminated);
        assert!(text.contains("SHUTDOWN disarm failed"));
        assert!(text.contains("SHUTDOWN disconnect ok"));
    }

    #[test]
    fn test_every_shutdown_step_failing_still_terminates() {
        let mut o = orch(
            MockLink::failing(&["reset_override", "disarm", "disconnect"]),
            vec![],
        );

        let (res, _) = run(&mut o);

        assert_eq!(res.unwrap().shutdown_failures, 3);
        assert_eq!(o.state(), OrchState::Terminated);
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        let mut o = orch(MockLink::failing(&["connect"]), vec![Ok(offset_marker())]);

        let (res, text) = run(&mut o);

        assert!(matches!(res, Err(OrchError::LinkConnect(_))));
        assert_eq!(o.link().calls, vec!["connect"]);
        assert_eq!(o.state(), OrchState::Terminated);
        assert!(text.contains("STATE CONNECTING -> ERROR"));
        assert!(text.contains("STATE ERROR -> SHUTTING_DOWN"));
        assert!(text.contains("SHUTDOWN skipped"));
    }

    #[test]
    fn test_arm_failure_releases_the_link() {
        let mut o = orch(MockLink::failing(&["arm"]), vec![Ok(offset_marker())]);

        let (res, text) = run(&mut o);

        assert!(matches!(res, Err(OrchError::LinkArm(_))));
        assert_eq!(
            o.link().calls,
            vec!["connect", "arm", "dispatch", "reset_override", "disarm", "disconnect"]
        );
        assert_eq!(o.summary().ticks, 0);
        assert!(text.contains("STATE ARMING -> ERROR"));
    }

    #[test]
    fn test_absent_marker_sends_neutral_frame() {
        let mut o = orch(
            MockLink::default(),
            vec![Ok(offset_marker()), Ok(MarkerObservation::absent())],
        );

        let (res, _) = run(&mut o);
        let summary = res.unwrap();

        assert_eq!(summary.marker_absent_ticks, 1);
        assert!(!o.link().frames[0].is_neutral());
        assert!(o.link().frames[1].is_neutral());
        assert_eq!(o.link().frames[1].lateral.value(), PWM_NEUTRAL);
    }

    #[test]
    fn test_dispatch_failure_continues() {
        let mut o = orch(MockLink::failing(&["dispatch"]), markers(4));

        let (res, text) = run(&mut o);
        let summary = res.unwrap();

        assert_eq!(summary.ticks, 4);
        // Four cycles plus the neutral frame of the shutdown
        assert_eq!(summary.dispatch_failures, 4);
        assert_eq!(summary.shutdown_failures, 1);
        assert_eq!(o.link().count("disconnect"), 1);
        assert_eq!(text.matches("DISPATCH tick").count(), 4);
    }

    #[test]
    fn test_vision_faults() {
        // Isolated faults are ridden through as marker absent
        let mut o = orch(
            MockLink::default(),
            vec![
                Ok(offset_marker()),
                Err(VisionError::NotConnected),
                Ok(offset_marker()),
            ],
        );
        let (res, _) = run(&mut o);
        let summary = res.unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.vision_faults, 1);
        assert_eq!(summary.marker_absent_ticks, 1);

        // Too many in a row stops the run
        let mut script = vec![Ok(offset_marker())];
        script.extend((0..3).map(|_| Err(VisionError::NotConnected)));
        script.push(Ok(offset_marker()));

        let mut o = orch(MockLink::default(), script);
        let (res, text) = run(&mut o);
        let summary = res.unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.vision_faults, 3);
        assert!(text.contains("STOPPING 3 consecutive vision faults"));
        assert_eq!(o.link().count("disconnect"), 1);
    }

    #[test]
    fn test_cancel_stops_before_next_cycle() {
        let mut o = orch(MockLink::default(), markers(10));

        let cancel = CancelToken::new();
        cancel.cancel();

        let mut log = RunLog::from_writer(Vec::new());
        let summary = o.run(&cancel, &mut log).unwrap();

        assert_eq!(summary.ticks, 0);
        assert_eq!(
            o.link().calls,
            vec!["connect", "arm", "dispatch", "reset_override", "disarm", "disconnect"]
        );
        let text = String::from_utf8(log.into_inner()).unwrap();
        assert!(text.contains("STOPPING cancelled"));
    }

    #[test]
    fn test_step_reports_axes() {
        let mut o = orch(MockLink::default(), vec![Ok(offset_marker())]);
        let mut log = RunLog::from_writer(Vec::new());

        assert_eq!(o.step(&mut log), TickOutcome::Continue);

        let report = o.last_report();
        assert_eq!(report.get(Axis::Lateral).error, 80.0);
        assert_eq!(report.get(Axis::Forward).error, 5000.0);
        assert!(report.get(Axis::Throttle).value > PWM_NEUTRAL);

        assert_eq!(
            o.step(&mut log),
            TickOutcome::Stop("end of the replay".into())
        );
        log.close();
    }
}
