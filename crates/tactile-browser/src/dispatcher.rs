//! Interaction orchestration: resolve the element's box, wait for it to
//! settle, pick a point and dispatch input at it.
//!
//! Each interaction walks the state machine
//! `ResolvingBox -> WaitingStable -> ComputingPoint -> Dispatching -> Done`
//! and records every transition in its [`InteractionReport`]. Any state can
//! fall into `Failed(kind)`. The only automatic recovery is re-running
//! `ResolvingBox` and `WaitingStable` when the element is not rendered and
//! the dispatcher was told to wait for it to attach.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::box_model::{resolve_bounding_box, resolve_box_model, BoxModel};
use crate::cancel::CancelSignal;
use crate::channel::{EventDispatch, RemoteQuery};
use crate::clickable::clickable_point;
use crate::config::InputConfig;
use crate::error::{BrowserError, ErrorKind};
use crate::geometry::{BoundingBox, Point};
use crate::handle::RemoteHandle;
use crate::keyboard::{lookup, Keyboard};
use crate::mouse::{ClickOptions, Mouse};
use crate::offset::{Offset, OffsetSource};
use crate::stability::{StabilityGate, StableElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InteractionState {
    ResolvingBox,
    WaitingStable,
    ComputingPoint,
    Dispatching,
    Done,
    Failed(ErrorKind),
}

/// What to do when the element has no layout yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachPolicy {
    /// Surface `ElementNotRendered` immediately.
    #[default]
    FailFast,
    /// Retry resolution and the stability wait up to `attach_retries` times.
    WaitForAttached,
}

/// Outcome of one interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionReport {
    /// The point input was (or would be) dispatched at, when one was computed.
    pub point: Option<Point>,
    /// Resolve-and-wait attempts made, including the first.
    pub attempts: u32,
    pub states: Vec<InteractionState>,
}

impl InteractionReport {
    pub fn final_state(&self) -> Option<InteractionState> {
        self.states.last().copied()
    }
}

/// A failed interaction together with how far it got.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct InteractionFailure {
    pub error: BrowserError,
    pub report: InteractionReport,
}

impl InteractionFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<InteractionFailure> for BrowserError {
    fn from(failure: InteractionFailure) -> Self {
        failure.error
    }
}

pub type InteractionResult = Result<InteractionReport, InteractionFailure>;

/// Transition log for a single interaction.
struct Interaction<'a> {
    handle: &'a RemoteHandle,
    operation: &'static str,
    started: Instant,
    deadline: Instant,
    attempts: u32,
    point: Option<Point>,
    states: Vec<InteractionState>,
}

impl<'a> Interaction<'a> {
    fn begin(handle: &'a RemoteHandle, operation: &'static str, config: &InputConfig) -> Self {
        let started = Instant::now();
        Self {
            handle,
            operation,
            started,
            deadline: started + config.interaction_timeout(),
            attempts: 0,
            point: None,
            states: Vec::new(),
        }
    }

    fn enter(&mut self, state: InteractionState) {
        tracing::debug!(
            handle = %self.handle,
            operation = self.operation,
            state = ?state,
            attempt = self.attempts,
            "interaction transition"
        );
        self.states.push(state);
    }

    fn report(&self) -> InteractionReport {
        InteractionReport {
            point: self.point,
            attempts: self.attempts,
            states: self.states.clone(),
        }
    }

    fn finish(mut self) -> InteractionReport {
        self.enter(InteractionState::Done);
        tracing::info!(
            handle = %self.handle,
            operation = self.operation,
            attempts = self.attempts,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "interaction complete"
        );
        self.report()
    }

    fn fail(mut self, error: BrowserError) -> InteractionFailure {
        self.enter(InteractionState::Failed(error.kind()));
        tracing::warn!(
            handle = %self.handle,
            operation = self.operation,
            attempts = self.attempts,
            error = %error,
            "interaction failed"
        );
        InteractionFailure {
            error,
            report: self.report(),
        }
    }

    /// Race `fut` against cancellation and the interaction deadline.
    async fn bounded<T, F>(
        &self,
        cancel: &CancelSignal,
        what: &'static str,
        fut: F,
    ) -> Result<T, BrowserError>
    where
        F: Future<Output = Result<T, BrowserError>>,
    {
        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.cancelled()),
            res = fut => res,
            _ = tokio::time::sleep_until(self.deadline) => {
                if cancel.is_cancelled() {
                    Err(self.cancelled())
                } else {
                    Err(BrowserError::Timeout {
                        method: what.to_string(),
                        duration: self.started.elapsed(),
                    })
                }
            }
        }
    }

    fn cancelled(&self) -> BrowserError {
        BrowserError::ElementHandleCancelled {
            handle: self.handle.to_string(),
        }
    }
}

/// Drives geometry resolution and input synthesis for one page.
pub struct InputDispatcher {
    query: Arc<dyn RemoteQuery>,
    events: Arc<dyn EventDispatch>,
    keyboard: Arc<Keyboard>,
    mouse: Mouse,
    config: InputConfig,
    attach: AttachPolicy,
}

impl InputDispatcher {
    pub fn new(
        query: Arc<dyn RemoteQuery>,
        events: Arc<dyn EventDispatch>,
        config: InputConfig,
    ) -> Self {
        let keyboard = Arc::new(Keyboard::new(Arc::clone(&events)));
        let mouse = Mouse::new(Arc::clone(&events), Arc::clone(&keyboard));
        Self {
            query,
            events,
            keyboard,
            mouse,
            config,
            attach: AttachPolicy::default(),
        }
    }

    pub fn with_attach_policy(mut self, attach: AttachPolicy) -> Self {
        self.attach = attach;
        self
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn keyboard(&self) -> &Arc<Keyboard> {
        &self.keyboard
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    /// Click options with the configured press/release delay.
    pub fn default_click_options(&self) -> ClickOptions {
        ClickOptions {
            delay: self.config.click_delay(),
            ..ClickOptions::default()
        }
    }

    /// Wait for `handle` to settle, then click it.
    pub async fn click(
        &self,
        handle: &RemoteHandle,
        options: &ClickOptions,
        offset: impl Into<OffsetSource>,
        cancel: &CancelSignal,
    ) -> InteractionResult {
        let mut run = Interaction::begin(handle, "click", &self.config);
        let point = match self.acquire_point(&mut run, offset.into(), cancel).await {
            Ok(point) => point,
            Err(err) => return Err(run.fail(err)),
        };

        run.enter(InteractionState::Dispatching);
        let steps = self.config.mouse_move_steps;
        let result = run
            .bounded(cancel, "Input.dispatchMouseEvent", self.mouse.click(point, options, steps))
            .await;
        match result {
            Ok(()) => Ok(run.finish()),
            Err(err) => {
                self.release_held(&run).await;
                Err(run.fail(err))
            }
        }
    }

    /// Wait for `handle` to settle, then move the pointer over it.
    pub async fn hover(
        &self,
        handle: &RemoteHandle,
        offset: impl Into<OffsetSource>,
        cancel: &CancelSignal,
    ) -> InteractionResult {
        let mut run = Interaction::begin(handle, "hover", &self.config);
        let point = match self.acquire_point(&mut run, offset.into(), cancel).await {
            Ok(point) => point,
            Err(err) => return Err(run.fail(err)),
        };

        run.enter(InteractionState::Dispatching);
        let steps = self.config.mouse_move_steps;
        let result = run
            .bounded(cancel, "Input.dispatchMouseEvent", self.mouse.move_to(point, steps))
            .await;
        match result {
            Ok(()) => Ok(run.finish()),
            Err(err) => Err(run.fail(err)),
        }
    }

    /// Focus `handle` and press `key` once.
    ///
    /// The key name is checked before focus moves, so an unknown key leaves
    /// the page untouched.
    pub async fn press(
        &self,
        handle: &RemoteHandle,
        key: &str,
        cancel: &CancelSignal,
    ) -> InteractionResult {
        let mut run = Interaction::begin(handle, "press", &self.config);
        run.attempts = 1;
        if let Err(err) = lookup(key) {
            return Err(run.fail(err));
        }

        run.enter(InteractionState::Dispatching);
        let delay = self.config.key_delay();
        let result = run
            .bounded(cancel, "Input.dispatchKeyEvent", async {
                handle.ensure_alive()?;
                self.events.focus(handle).await?;
                self.keyboard.press(key, delay).await
            })
            .await;
        match result {
            Ok(()) => Ok(run.finish()),
            Err(err) => {
                self.release_held(&run).await;
                Err(run.fail(err))
            }
        }
    }

    /// Focus `handle` and type `text` into it.
    pub async fn type_into(
        &self,
        handle: &RemoteHandle,
        text: &str,
        cancel: &CancelSignal,
    ) -> InteractionResult {
        let mut run = Interaction::begin(handle, "type", &self.config);
        run.attempts = 1;

        run.enter(InteractionState::Dispatching);
        let delay = self.config.key_delay();
        let result = run
            .bounded(cancel, "Input.dispatchKeyEvent", async {
                handle.ensure_alive()?;
                self.events.focus(handle).await?;
                self.keyboard.type_text(text, delay).await
            })
            .await;
        match result {
            Ok(()) => Ok(run.finish()),
            Err(err) => {
                self.release_held(&run).await;
                Err(run.fail(err))
            }
        }
    }

    /// Resolve, wait and compute the interaction point without dispatching.
    pub async fn clickable_point(
        &self,
        handle: &RemoteHandle,
        offset: impl Into<OffsetSource>,
        cancel: &CancelSignal,
    ) -> InteractionResult {
        let mut run = Interaction::begin(handle, "clickable_point", &self.config);
        match self.acquire_point(&mut run, offset.into(), cancel).await {
            Ok(_) => Ok(run.finish()),
            Err(err) => Err(run.fail(err)),
        }
    }

    /// Current box model, or `None` when the element is not rendered.
    pub async fn box_model(&self, handle: &RemoteHandle) -> Result<Option<BoxModel>, BrowserError> {
        resolve_box_model(self.query.as_ref(), handle).await
    }

    /// Border-box bounding box, or `None` when the element is not rendered.
    pub async fn bounding_box(
        &self,
        handle: &RemoteHandle,
    ) -> Result<Option<BoundingBox>, BrowserError> {
        resolve_bounding_box(self.query.as_ref(), handle).await
    }

    /// Release keys and buttons left down by a dispatch that did not finish.
    ///
    /// Runs outside the interaction's cancellation and deadline.
    async fn release_held(&self, run: &Interaction<'_>) {
        if let Err(err) = self.keyboard.release_all().await {
            tracing::warn!(handle = %run.handle, error = %err, "failed to release held keys");
        }
        if let Err(err) = self.mouse.release_all().await {
            tracing::warn!(handle = %run.handle, error = %err, "failed to release held buttons");
        }
    }

    async fn acquire_point(
        &self,
        run: &mut Interaction<'_>,
        offset: OffsetSource,
        cancel: &CancelSignal,
    ) -> Result<Point, BrowserError> {
        let offset = Offset::from_source(offset)?;

        let stable = loop {
            run.attempts += 1;
            match self.resolve_and_wait(run, cancel).await {
                Ok(stable) => break stable,
                Err(err)
                    if err.kind() == ErrorKind::ElementNotRendered
                        && self.attach == AttachPolicy::WaitForAttached
                        && run.attempts <= self.config.attach_retries =>
                {
                    tracing::debug!(
                        handle = %run.handle,
                        attempt = run.attempts,
                        "element not rendered, waiting for it to attach"
                    );
                    run.bounded(cancel, "Runtime.evaluate", self.query.next_frame())
                        .await?;
                }
                Err(err) => return Err(err),
            }
        };

        run.enter(InteractionState::ComputingPoint);
        let point = clickable_point(&stable.model, offset, &stable.viewport)?;
        run.point = Some(point);
        Ok(point)
    }

    async fn resolve_and_wait(
        &self,
        run: &mut Interaction<'_>,
        cancel: &CancelSignal,
    ) -> Result<StableElement, BrowserError> {
        let handle = run.handle;

        run.enter(InteractionState::ResolvingBox);
        let seed = run
            .bounded(
                cancel,
                "DOM.getBoxModel",
                resolve_box_model(self.query.as_ref(), handle),
            )
            .await?
            .ok_or_else(|| BrowserError::ElementNotRendered {
                handle: handle.to_string(),
            })?;

        run.enter(InteractionState::WaitingStable);
        let remaining = run.deadline.saturating_duration_since(Instant::now());
        let timeout = remaining.min(self.config.stability_timeout());
        StabilityGate::new(self.query.as_ref(), cancel)
            .wait(handle, Some(seed), timeout)
            .await
    }
}
