//! Single-flight, memoized acquisition handle.
//!
//! Replaces the cached-promise idiom with an explicit tagged state
//! machine (`Unresolved → Acquiring → Ready | Failed`) so the
//! single-flight and terminal-failure-replay behavior is observable and
//! testable in isolation.

use doh_executor_domain::TransportError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Mutex;

type AcquireFuture<T> = Shared<BoxFuture<'static, Result<T, TransportError>>>;

/// Externally observable acquisition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No acquisition attempted yet.
    Unresolved,
    /// An acquisition is in flight; concurrent callers share it.
    Acquiring,
    /// Acquisition succeeded; the value is reused for the handle's lifetime.
    Ready,
    /// Acquisition failed; the error is replayed to every caller. Terminal.
    Failed,
}

enum HandleState<T> {
    Unresolved,
    Acquiring(AcquireFuture<T>),
    Ready(T),
    Failed(TransportError),
}

/// A one-shot asynchronous cell: the first caller runs the acquisition
/// future, concurrent callers await the same in-flight future, and the
/// single resolution (success or failure) is cached forever after.
///
/// The decision to start acquiring happens under the lock, before any
/// await point, so two racing first callers can never both run the
/// initializer. The lock is never held across an await.
pub struct ClientHandle<T> {
    state: Mutex<HandleState<T>>,
}

impl<T> Default for ClientHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ClientHandle<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandleState::Unresolved),
        }
    }

    pub fn state(&self) -> ClientState {
        match *self.state.lock().expect("client handle lock poisoned") {
            HandleState::Unresolved => ClientState::Unresolved,
            HandleState::Acquiring(_) => ClientState::Acquiring,
            HandleState::Ready(_) => ClientState::Ready,
            HandleState::Failed(_) => ClientState::Failed,
        }
    }
}

impl<T> ClientHandle<T>
where
    T: Clone + Send + 'static,
{
    /// Return the acquired value, running `acquire` exactly once across
    /// the handle's lifetime. A failed acquisition is terminal: the same
    /// error is returned to every waiting and future caller without
    /// re-running `acquire`.
    pub async fn get_or_acquire<F, Fut>(&self, acquire: F) -> Result<T, TransportError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock().expect("client handle lock poisoned");
            match &*state {
                HandleState::Ready(value) => return Ok(value.clone()),
                HandleState::Failed(err) => return Err(err.clone()),
                HandleState::Acquiring(in_flight) => in_flight.clone(),
                HandleState::Unresolved => {
                    let in_flight = acquire().boxed().shared();
                    *state = HandleState::Acquiring(in_flight.clone());
                    in_flight
                }
            }
        };

        let result = shared.await;

        let mut state = self.state.lock().expect("client handle lock poisoned");
        if matches!(*state, HandleState::Acquiring(_)) {
            *state = match &result {
                Ok(value) => HandleState::Ready(value.clone()),
                Err(err) => HandleState::Failed(err.clone()),
            };
        }
        result
    }
}
