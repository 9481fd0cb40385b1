//! Test lifecycle events and their observers.
//!
//! The runner dispatches every event synchronously to each registered
//! listener, in registration order. Listeners are wired up once at
//! construction time; there is no dynamic subscription.

pub mod allure;
pub mod console;

use async_trait::async_trait;

use crate::session::UnitId;

pub use allure::AllureListener;
pub use console::ConsoleListener;

/// Lifecycle events observed over one test run.
#[derive(Debug, Clone)]
pub enum TestEvent {
    RunStarted {
        suite: String,
    },
    TestStarted {
        unit: UnitId,
        name: String,
    },
    TestPassed {
        unit: UnitId,
        name: String,
    },
    TestFailed {
        unit: UnitId,
        name: String,
        /// Underlying error description, when one exists.
        error: Option<String>,
    },
    TestSkipped {
        unit: UnitId,
        name: String,
    },
    RunFinished {
        suite: String,
    },
}

/// Event sink. Observers must never influence test outcomes; anything that
/// goes wrong inside a listener stays inside the listener.
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn on_event(&self, event: &TestEvent);
}

/// Fans events out to the configured listeners, synchronously and in order.
pub struct EventEmitter {
    listeners: Vec<Box<dyn LifecycleListener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Box<dyn LifecycleListener>) {
        self.listeners.push(listener);
    }

    pub async fn emit(&self, event: TestEvent) {
        for listener in &self.listeners {
            listener.on_event(&event).await;
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
