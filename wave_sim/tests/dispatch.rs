// tests/dispatch.rs

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wave_sim::dispatch::{CompletionSink, DispatchState, FieldCompletion, FieldJob};
use wave_sim::{
    ComputeBackend, ComputeDispatcher, CpuFieldBackend, EngineError, FieldRequest, FieldSnapshot,
    SimulationParameters, SystemType,
};

const WATCHDOG: Duration = Duration::from_secs(1);

type Launched = Arc<Mutex<Vec<(FieldJob, CompletionSink)>>>;

/// Holds launched jobs until the test completes them by hand
#[derive(Default)]
struct ManualBackend {
    launched: Launched,
}

impl ComputeBackend for ManualBackend {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn launch(&mut self, job: FieldJob, sink: CompletionSink) -> Result<(), EngineError> {
        self.launched.lock().push((job, sink));
        Ok(())
    }
}

struct RefusingBackend;

impl ComputeBackend for RefusingBackend {
    fn name(&self) -> &'static str {
        "refusing"
    }

    fn launch(&mut self, _job: FieldJob, _sink: CompletionSink) -> Result<(), EngineError> {
        Err(EngineError::ComputeFailed("queue full".into()))
    }
}

fn manual() -> (ComputeDispatcher, Launched) {
    let backend = ManualBackend::default();
    let launched = backend.launched.clone();
    (ComputeDispatcher::new(Box::new(backend), WATCHDOG), launched)
}

fn request(level: u32) -> FieldRequest {
    let params = SimulationParameters::for_system(SystemType::PotentialWell)
        .with_energy_level(level)
        .with_grid_points(64);
    FieldRequest {
        params,
        time: 0.0,
        revision: 0,
    }
}

fn complete(launched: &Launched, index: usize) {
    let (job, sink) = launched.lock()[index].clone();
    let snapshot = FieldSnapshot::evaluate(&job.request.params, job.request.time);
    sink.send(FieldCompletion {
        job_id: job.id,
        request: job.request,
        result: Ok(snapshot),
    })
    .unwrap();
}

#[test]
fn test_second_submit_is_coalesced_while_busy() {
    let (mut dispatcher, launched) = manual();

    assert!(dispatcher.submit(request(1)), "idle dispatcher launches immediately");
    assert!(!dispatcher.submit(request(2)));
    assert!(!dispatcher.submit(request(3)));

    assert_eq!(launched.lock().len(), 1, "only one job may be in flight");
    assert!(dispatcher.is_busy());
    assert_eq!(dispatcher.pending().map(|r| r.params.energy_level), Some(3));
    assert_eq!(dispatcher.stats().coalesced, 1);
}

#[test]
fn test_latest_pending_request_is_the_one_rendered() {
    let (mut dispatcher, launched) = manual();
    dispatcher.submit(request(1));
    dispatcher.submit(request(2));
    dispatcher.submit(request(3));

    let mut delivered = Vec::new();
    complete(&launched, 0);
    let seen = launched.clone();
    dispatcher.poll(|request, _| {
        // Delivery happens before the pending request is launched
        assert_eq!(seen.lock().len(), 1);
        delivered.push(request.params.energy_level);
    });

    assert_eq!(launched.lock().len(), 2);
    assert_eq!(launched.lock()[1].0.request.params.energy_level, 3);
    assert!(dispatcher.pending().is_none());

    complete(&launched, 1);
    dispatcher.poll(|request, _| delivered.push(request.params.energy_level));

    assert_eq!(delivered, vec![1, 3], "level 2 was superseded and never computed");
    assert!(!dispatcher.is_busy());
    let stats = dispatcher.stats();
    assert_eq!((stats.launched, stats.completed), (2, 2));
}

#[test]
fn test_watchdog_clears_busy_and_drops_late_completion() {
    let (mut dispatcher, launched) = manual();
    let start = Instant::now();

    assert!(dispatcher.submit_at(request(1), start));
    let deadline = match dispatcher.state() {
        DispatchState::Busy { deadline, .. } => deadline,
        DispatchState::Idle => panic!("dispatcher should be busy"),
    };
    assert_eq!(deadline, start + WATCHDOG);

    // Before the deadline nothing changes
    assert_eq!(dispatcher.poll_at(start + WATCHDOG / 2, |_, _| {}), 0);
    assert!(dispatcher.is_busy());

    assert_eq!(dispatcher.poll_at(start + WATCHDOG + Duration::from_millis(1), |_, _| {}), 0);
    assert_eq!(dispatcher.state(), DispatchState::Idle);
    assert_eq!(dispatcher.stats().timed_out, 1);

    // The lost job reports in after all
    complete(&launched, 0);
    let delivered = dispatcher.poll(|_, _| panic!("stale completion must not be delivered"));
    assert_eq!(delivered, 0);
    assert_eq!(dispatcher.stats().stale, 1);

    // And the pipeline keeps working
    assert!(dispatcher.submit(request(2)));
}

#[test]
fn test_watchdog_launches_pending_request() {
    let (mut dispatcher, launched) = manual();
    let start = Instant::now();
    dispatcher.submit_at(request(1), start);
    dispatcher.submit_at(request(2), start);

    let later = start + WATCHDOG * 2;
    dispatcher.poll_at(later, |_, _| {});

    assert_eq!(launched.lock().len(), 2);
    match dispatcher.state() {
        DispatchState::Busy { job_id, deadline } => {
            assert_eq!(job_id, launched.lock()[1].0.id);
            assert_eq!(deadline, later + WATCHDOG);
        }
        DispatchState::Idle => panic!("pending request should have launched"),
    }

    // Completion of the abandoned job is stale; the new job is still in flight
    complete(&launched, 0);
    dispatcher.poll_at(later, |_, _| panic!("stale completion delivered"));
    assert!(dispatcher.is_busy());

    complete(&launched, 1);
    let mut levels = Vec::new();
    dispatcher.poll_at(later, |request, _| levels.push(request.params.energy_level));
    assert_eq!(levels, vec![2]);
}

#[test]
fn test_written_off_request_is_handed_back() {
    let (mut dispatcher, _launched) = manual();
    let start = Instant::now();
    dispatcher.submit_at(request(1), start);

    assert!(dispatcher.take_written_off().is_none(), "nothing lost while in flight");
    dispatcher.poll_at(start + WATCHDOG * 2, |_, _| {});

    let lost = dispatcher.take_written_off().expect("timed out job should be handed back");
    assert_eq!(lost.params.energy_level, 1);
    assert!(dispatcher.take_written_off().is_none(), "handed back once");
}

#[test]
fn test_pending_request_replaces_written_off_job() {
    let (mut dispatcher, launched) = manual();
    let start = Instant::now();
    dispatcher.submit_at(request(1), start);
    dispatcher.submit_at(request(2), start);

    dispatcher.poll_at(start + WATCHDOG * 2, |_, _| {});
    assert!(dispatcher.take_written_off().is_none());
    assert_eq!(launched.lock().len(), 2);
}

#[test]
fn test_failed_completion_returns_to_idle() {
    let (mut dispatcher, launched) = manual();
    dispatcher.submit(request(1));

    let (job, sink) = launched.lock()[0].clone();
    sink.send(FieldCompletion {
        job_id: job.id,
        request: job.request,
        result: Err(EngineError::ComputeFailed("device lost".into())),
    })
    .unwrap();

    assert_eq!(dispatcher.poll(|_, _| panic!("failed job delivered")), 0);
    assert!(!dispatcher.is_busy());
    assert_eq!(dispatcher.stats().failed, 1);
}

#[test]
fn test_refused_launch_leaves_dispatcher_idle() {
    let mut dispatcher = ComputeDispatcher::new(Box::new(RefusingBackend), WATCHDOG);
    assert!(!dispatcher.submit(request(1)));
    assert!(!dispatcher.is_busy());
    assert!(dispatcher.pending().is_none());
    assert_eq!(dispatcher.stats().failed, 1);
}

#[test]
fn test_cpu_backend_end_to_end() {
    let mut dispatcher = ComputeDispatcher::new(Box::new(CpuFieldBackend), WATCHDOG);
    assert_eq!(dispatcher.backend_name(), "cpu");

    let req = request(2);
    let expected = FieldSnapshot::evaluate(&req.params, req.time);
    assert!(dispatcher.submit(req));

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut received = None;
    while received.is_none() {
        dispatcher.poll(|_, snapshot| received = Some(snapshot));
        assert!(Instant::now() < deadline, "cpu backend never completed");
        std::thread::sleep(Duration::from_millis(1));
    }

    let snapshot = received.unwrap();
    assert_eq!(snapshot, expected);
    assert!(!dispatcher.is_busy());
}
