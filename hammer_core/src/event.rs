//! Event and messaging system.
//!
//! This is a small typed event bus. The game pushes notifications at phase
//! boundaries only; the session drains them once per frame.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::{game::GamePhase, game::ThrowResult, power::ThrowPower};

/// Typed event bus.
#[derive(Default)]
pub struct EventBus {
    queues: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EventBus {
    /// Pushes an event into the queue.
    pub fn push<E: 'static + Send + Sync>(&mut self, e: E) {
        let q = self
            .queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        let q = q.downcast_mut::<Vec<E>>().expect("queue type mismatch");
        q.push(e);
    }

    /// Drains all queued events of a type.
    pub fn drain<E: 'static + Send + Sync>(&mut self) -> Vec<E> {
        self.queues
            .remove(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast::<Vec<E>>().ok())
            .map(|boxed| *boxed)
            .unwrap_or_default()
    }

    /// Number of queued events of a type.
    pub fn pending<E: 'static + Send + Sync>(&self) -> usize {
        self.queues
            .get(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast_ref::<Vec<E>>())
            .map_or(0, Vec::len)
    }
}

/// Game notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PhaseChanged { from: GamePhase, to: GamePhase },
    /// Power committed and wind-up started.
    ThrowReleased { power: ThrowPower },
    /// The hammer left the thrower's hands.
    Launched,
    /// First ground contact.
    Landed { impact_speed: f32 },
    Finished(ThrowResult),
    /// A release was rejected; the game stayed idle.
    ReleaseRejected { reason: String },
}
