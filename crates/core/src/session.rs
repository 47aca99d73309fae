use std::sync::Arc;

use tracing::debug;

use crate::action::{perform, Call};
use crate::backend::ApiBackend;
use crate::controller::{GuardError, ViewStateController};
use crate::request_tokens::Applied;

/// Runs user actions to completion against a backend, one at a time.
///
/// Each action is guard, one awaited round trip, then apply. Dependent
/// follow-ups (samples after extraction) run before the method returns.
pub struct Session<B: ApiBackend + ?Sized> {
    backend: Arc<B>,
    controller: ViewStateController,
}

impl<B: ApiBackend + ?Sized> Session<B> {
    pub fn new(backend: Arc<B>, controller: ViewStateController) -> Self {
        Self {
            backend,
            controller,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn controller(&self) -> &ViewStateController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewStateController {
        &mut self.controller
    }

    pub fn into_controller(self) -> ViewStateController {
        self.controller
    }

    pub async fn connect(&mut self) -> Result<Applied, GuardError> {
        let call = self.controller.begin_connect()?;
        Ok(self.dispatch(call).await)
    }

    pub async fn disconnect(&mut self) {
        let call = self.controller.disconnect();
        self.dispatch(call).await;
    }

    pub async fn extract_metadata(&mut self) -> Result<Applied, GuardError> {
        let call = self.controller.begin_extract()?;
        Ok(self.dispatch(call).await)
    }

    pub async fn refresh_samples(&mut self) -> Result<Applied, GuardError> {
        let call = self.controller.refresh_samples()?;
        Ok(self.dispatch(call).await)
    }

    pub async fn generate(&mut self) -> Result<Applied, GuardError> {
        let call = self.controller.begin_generate()?;
        Ok(self.dispatch(call).await)
    }

    pub async fn execute(&mut self) -> Result<Applied, GuardError> {
        let call = self.controller.begin_execute()?;
        Ok(self.dispatch(call).await)
    }

    pub async fn load_sample_metadata(&mut self) {
        let call = self.controller.load_sample_metadata();
        self.dispatch(call).await;
    }

    /// Performs `call` and any follow-ups it schedules. Returns whether the
    /// first outcome was applied.
    pub async fn dispatch(&mut self, call: Call) -> Applied {
        let completion = perform(self.backend.as_ref(), call).await;
        let update = self.controller.apply(completion);
        let applied = update.applied;

        let mut next = update.follow_up;
        while let Some(call) = next.take() {
            debug!(?call, "running follow-up call");
            let completion = perform(self.backend.as_ref(), call).await;
            next = self.controller.apply(completion).follow_up;
        }

        applied
    }
}
