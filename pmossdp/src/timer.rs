//! Timer à déclenchement unique, reprogrammable.
//!
//! Chaque timer possède son propre thread. Une nouvelle échéance remplace
//! l'échéance en attente au lieu de s'y ajouter. Le callback peut retourner
//! un délai pour se reprogrammer lui-même.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::warn;

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    disposed: bool,
}

#[derive(Debug, Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
}

/// Timer reprogrammable sur un thread nommé.
#[derive(Debug)]
pub struct ReconfigurableTimer {
    name: String,
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ReconfigurableTimer {
    /// Crée un timer désarmé.
    ///
    /// `callback` est appelé sur le thread du timer à chaque échéance ; s'il
    /// retourne `Some(delai)`, le timer est réarmé.
    pub fn new<F>(name: &str, callback: F) -> io::Result<Self>
    where
        F: Fn() -> Option<Duration> + Send + 'static,
    {
        let shared = Arc::new(TimerShared::default());
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&thread_shared, callback))?;

        Ok(Self {
            name: name.to_string(),
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Programme le prochain déclenchement dans `delay`, en remplaçant
    /// l'échéance courante.
    pub fn change(&self, delay: Duration) {
        let mut state = self.shared.state.lock();
        state.deadline = Some(Instant::now() + delay);
        self.shared.condvar.notify_one();
    }

    /// Désarme le timer.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        self.shared.condvar.notify_one();
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Arrête le thread du timer et attend la fin d'un callback en cours.
    ///
    /// Appelé depuis le callback lui-même, ne fait que marquer l'arrêt.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.state.lock();
            state.disposed = true;
            state.deadline = None;
            self.shared.condvar.notify_one();
        }
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("❌ Timer thread '{}' panicked", self.name);
        }
    }
}

impl Drop for ReconfigurableTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run<F>(shared: &TimerShared, callback: F)
where
    F: Fn() -> Option<Duration>,
{
    let mut state = shared.state.lock();
    loop {
        if state.disposed {
            return;
        }
        match state.deadline {
            None => shared.condvar.wait(&mut state),
            Some(deadline) if Instant::now() >= deadline => {
                state.deadline = None;
                let next = MutexGuard::unlocked(&mut state, &callback);
                if let Some(delay) = next {
                    if !state.disposed {
                        state.deadline = Some(Instant::now() + delay);
                    }
                }
            }
            Some(deadline) => {
                shared.condvar.wait_until(&mut state, deadline);
            }
        }
    }
}
