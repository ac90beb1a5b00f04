//! Collaborator doubles: elevation, handlers and the shutdown signal source.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fulltrust_config::Config;
use fulltrust_envelope::Envelope;

use crate::dispatch::{HandlerError, HandlerRegistry, MessageHandler};
use crate::elevation::{Elevation, RelaunchError};
use crate::lifecycle::{
    HelperServices, ShutdownError, ShutdownLatch, ShutdownSignal, SignalWatch,
};
use crate::transport::Connection;

/// Handler activity observed during a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    Initialized(&'static str),
    Handled(&'static str, String),
    Disposed(&'static str),
}

/// Command the recording handlers take a while to finish.
pub const SLOW_COMMAND: &str = "Slow";

/// How the elevation double answers relaunch requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaunchBehaviour {
    Succeed,
    Decline,
    Fail,
}

struct TestElevation {
    elevated: bool,
    behaviour: RelaunchBehaviour,
    relaunches: Arc<AtomicUsize>,
}

impl Elevation for TestElevation {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn relaunch_elevated(&self) -> Result<(), RelaunchError> {
        self.relaunches.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            RelaunchBehaviour::Succeed => Ok(()),
            RelaunchBehaviour::Decline => Err(RelaunchError::Declined {
                program: "test-broker".to_owned(),
            }),
            RelaunchBehaviour::Fail => Err(RelaunchError::Spawn {
                program: "test-broker".to_owned(),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }
}

struct RecordingHandler {
    name: &'static str,
    events: Arc<Mutex<Vec<HandlerEvent>>>,
    panics: bool,
    refuses_init: bool,
}

impl RecordingHandler {
    fn record(&self, event: HandlerEvent) {
        self.events
            .lock()
            .expect("handler events mutex poisoned")
            .push(event);
    }
}

impl MessageHandler for RecordingHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&self, _connection: &Arc<Connection>) -> Result<(), HandlerError> {
        if self.refuses_init {
            return Err(HandlerError::failed("initialisation refused"));
        }
        self.record(HandlerEvent::Initialized(self.name));
        Ok(())
    }

    fn handle(
        &self,
        _connection: &Connection,
        _message: &Envelope,
        command: &str,
    ) -> Result<(), HandlerError> {
        assert!(!self.panics, "{} handler exploded", self.name);
        if command == SLOW_COMMAND {
            thread::sleep(Duration::from_millis(200));
        }
        self.record(HandlerEvent::Handled(self.name, command.to_owned()));
        Ok(())
    }

    fn dispose(&self) {
        self.record(HandlerEvent::Disposed(self.name));
    }
}

/// Services double with configurable privilege and handler behaviour.
#[derive(Clone)]
pub struct TestServices {
    pub elevated: bool,
    pub relaunch: RelaunchBehaviour,
    pub panicking_handler: bool,
    pub refusing_handler: bool,
    relaunches: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<HandlerEvent>>>,
}

impl TestServices {
    #[must_use]
    pub fn new() -> Self {
        Self {
            elevated: false,
            relaunch: RelaunchBehaviour::Succeed,
            panicking_handler: false,
            refusing_handler: false,
            relaunches: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handler activity recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<HandlerEvent> {
        self.events
            .lock()
            .expect("handler events mutex poisoned")
            .clone()
    }

    /// Commands seen by the recording handler named `name`.
    #[must_use]
    pub fn commands_seen_by(&self, name: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HandlerEvent::Handled(handler, command) if handler == name => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Number of relaunch attempts.
    #[must_use]
    pub fn relaunches(&self) -> usize {
        self.relaunches.load(Ordering::SeqCst)
    }

    fn handler(&self, name: &'static str) -> RecordingHandler {
        RecordingHandler {
            name,
            events: Arc::clone(&self.events),
            panics: false,
            refuses_init: false,
        }
    }
}

impl HelperServices for TestServices {
    fn elevation(&self, _config: &Config) -> Arc<dyn Elevation> {
        Arc::new(TestElevation {
            elevated: self.elevated,
            behaviour: self.relaunch,
            relaunches: Arc::clone(&self.relaunches),
        })
    }

    fn handlers(&self, _config: &Config) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        if self.panicking_handler {
            let mut exploding = self.handler("exploding");
            exploding.panics = true;
            registry.register(Box::new(exploding));
        }
        let mut first = self.handler("first");
        first.refuses_init = self.refusing_handler;
        registry.register(Box::new(first));
        registry.register(Box::new(self.handler("second")));
        registry
    }
}

/// Shutdown source that exposes the latch so scenarios can fire it.
#[derive(Clone, Default)]
pub struct TestShutdownSignal {
    latch: Arc<Mutex<Option<ShutdownLatch>>>,
}

impl TestShutdownSignal {
    /// Latch observed by the running helper, once it is watching.
    #[must_use]
    pub fn latch(&self) -> Option<ShutdownLatch> {
        self.latch
            .lock()
            .expect("shutdown latch mutex poisoned")
            .clone()
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn watch(&self, latch: &ShutdownLatch) -> Result<SignalWatch, ShutdownError> {
        *self.latch.lock().expect("shutdown latch mutex poisoned") = Some(latch.clone());
        Ok(SignalWatch::inert())
    }
}
