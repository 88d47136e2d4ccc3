//! Periodic scenario threads.
//!
//! A scenario sets one device field to each of its values in turn, one value
//! per interval, until the premise stops. Threads sleep in short steps so a
//! stop request is noticed within [`SLEEP_STEP`].

use crate::configuration::ScenarioConfig;
use crate::dpt::DptValue;
use crate::error::{KnxError, Result};
use crate::sim_log;
use crate::utility::{sleep_while_running, SLEEP_STEP};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receiver of scenario values
pub trait ScenarioSink: Send + Sync {
    /// Set `field` of `device` to `value`
    fn apply(&self, device: &str, field: &str, value: DptValue) -> Result<()>;
}

/// A field driven through a fixed list of values
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Target device id
    pub device: String,
    /// Target field
    pub field: String,
    /// Time between values
    pub interval: Duration,
    /// Values in application order
    pub values: Vec<DptValue>,
}

impl From<&ScenarioConfig> for Scenario {
    fn from(config: &ScenarioConfig) -> Self {
        Self {
            device: config.device.clone(),
            field: config.field.clone(),
            interval: Duration::from_secs_f64(config.interval_secs),
            values: config.values.clone(),
        }
    }
}

impl Scenario {
    fn run(&self, sink: &dyn ScenarioSink, running: &AtomicBool, step: Duration) {
        sim_log!(
            debug,
            "Scenario started: {}.{} every {:?}",
            self.device,
            self.field,
            self.interval
        );
        for value in self.values.iter().cycle() {
            if !running.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = sink.apply(&self.device, &self.field, value.clone()) {
                sim_log!(warn, "Scenario {}.{} failed: {}", self.device, self.field, e);
            }
            if !sleep_while_running(running, self.interval, step) {
                break;
            }
        }
        sim_log!(debug, "Scenario stopped: {}.{}", self.device, self.field);
    }
}

/// Owner of the scenario threads of one premise
#[derive(Debug)]
pub struct ScenarioRunner {
    running: Arc<AtomicBool>,
    step: Duration,
    threads: Vec<JoinHandle<()>>,
}

impl ScenarioRunner {
    /// Runner whose threads live while `running` is set
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            step: SLEEP_STEP,
            threads: Vec::new(),
        }
    }

    /// Use a different sleep step
    #[must_use]
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Start a thread for `scenario`
    pub fn spawn(&mut self, scenario: Scenario, sink: Arc<dyn ScenarioSink>) -> Result<()> {
        if scenario.values.is_empty() {
            return Ok(());
        }
        let running = Arc::clone(&self.running);
        let step = self.step;
        let thread = thread::Builder::new()
            .name(format!("scenario-{}", scenario.device))
            .spawn(move || scenario.run(sink.as_ref(), &running, step))
            .map_err(KnxError::spawn_failed)?;
        self.threads.push(thread);
        Ok(())
    }

    /// Number of started threads
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// True when no thread was started
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Clear the running flag and wait for every thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                sim_log!(error, "Scenario thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::lock;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<(String, String, DptValue)>>,
        fail: bool,
    }

    impl ScenarioSink for Recorder {
        fn apply(&self, device: &str, field: &str, value: DptValue) -> Result<()> {
            lock(&self.applied).push((device.to_string(), field.to_string(), value));
            if self.fail {
                return Err(KnxError::unknown_device(device));
            }
            Ok(())
        }
    }

    impl Recorder {
        fn count(&self) -> usize {
            lock(&self.applied).len()
        }

        fn wait_for(&self, n: usize) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.count() < n && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn toggling(interval: Duration) -> Scenario {
        Scenario {
            device: "light-1".into(),
            field: "on".into(),
            interval,
            values: vec![DptValue::Bool(true), DptValue::Bool(false)],
        }
    }

    #[test]
    fn test_from_config() {
        let config = ScenarioConfig {
            device: "stat".into(),
            field: "current_temperature".into(),
            interval_secs: 2.5,
            values: vec![DptValue::Float(20.0)],
        };
        let scenario = Scenario::from(&config);
        assert_eq!(scenario.interval, Duration::from_millis(2500));
        assert_eq!(scenario.values, vec![DptValue::Float(20.0)]);
    }

    #[test]
    fn test_values_cycle() {
        let running = Arc::new(AtomicBool::new(true));
        let recorder = Arc::new(Recorder::default());
        let mut runner = ScenarioRunner::new(Arc::clone(&running)).with_step(Duration::from_millis(1));
        runner
            .spawn(toggling(Duration::from_millis(2)), Arc::clone(&recorder) as Arc<dyn ScenarioSink>)
            .unwrap();
        assert_eq!(runner.len(), 1);

        recorder.wait_for(3);
        runner.stop();
        assert!(!running.load(Ordering::Relaxed));

        let applied = lock(&recorder.applied);
        assert!(applied.len() >= 3);
        assert_eq!(applied[0].2, DptValue::Bool(true));
        assert_eq!(applied[1].2, DptValue::Bool(false));
        assert_eq!(applied[2].2, DptValue::Bool(true));
        assert_eq!(applied[0].0, "light-1");
    }

    #[test]
    fn test_errors_do_not_stop_the_scenario() {
        let running = Arc::new(AtomicBool::new(true));
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let mut runner = ScenarioRunner::new(running).with_step(Duration::from_millis(1));
        runner
            .spawn(toggling(Duration::from_millis(2)), Arc::clone(&recorder) as Arc<dyn ScenarioSink>)
            .unwrap();
        recorder.wait_for(2);
        runner.stop();
        assert!(recorder.count() >= 2);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let running = Arc::new(AtomicBool::new(true));
        let recorder = Arc::new(Recorder::default());
        let mut runner = ScenarioRunner::new(running).with_step(Duration::from_millis(5));
        runner
            .spawn(toggling(Duration::from_secs(3600)), Arc::clone(&recorder) as Arc<dyn ScenarioSink>)
            .unwrap();
        recorder.wait_for(1);

        let started = Instant::now();
        runner.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_empty_scenario_not_started() {
        let mut runner = ScenarioRunner::new(Arc::new(AtomicBool::new(true)));
        let scenario = Scenario {
            values: Vec::new(),
            ..toggling(Duration::from_secs(1))
        };
        runner.spawn(scenario, Arc::new(Recorder::default())).unwrap();
        assert!(runner.is_empty());
    }

    #[test]
    fn test_not_running_applies_nothing() {
        let recorder = Arc::new(Recorder::default());
        let mut runner = ScenarioRunner::new(Arc::new(AtomicBool::new(false)));
        runner
            .spawn(toggling(Duration::from_millis(1)), Arc::clone(&recorder) as Arc<dyn ScenarioSink>)
            .unwrap();
        runner.stop();
        assert_eq!(recorder.count(), 0);
    }
}
