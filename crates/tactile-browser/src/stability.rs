//! Waiting for an element to stop moving and become visible.
//!
//! The gate samples the element's box model once per animation frame and
//! compares the content quad with the previous sample. Two consecutive equal
//! samples whose target quad is visible in the viewport end the wait. Every remote
//! call is raced against the deadline and the cancellation signal; when both
//! fire, cancellation wins.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::box_model::{resolve_box_model, BoxModel};
use crate::cancel::CancelSignal;
use crate::channel::RemoteQuery;
use crate::clickable::target_quad;
use crate::error::BrowserError;
use crate::geometry::{Quad, Viewport};
use crate::handle::RemoteHandle;

/// An element that was judged stable and visible.
#[derive(Debug, Clone, Copy)]
pub struct StableElement {
    pub model: BoxModel,
    pub viewport: Viewport,
    /// Box-model samples taken by the gate (the seed is not counted).
    pub samples: u32,
}

/// Two samples are stable when every corner matches within tolerance.
pub fn is_stable(previous: &Quad, current: &Quad) -> bool {
    previous.approx_eq(current)
}

/// A quad is visible when it has area and its centroid is inside the viewport.
pub fn is_visible(quad: &Quad, viewport: &Viewport) -> Result<bool, BrowserError> {
    if quad.bounding_box().area() <= 0.0 {
        return Ok(false);
    }
    Ok(viewport.contains(&quad.centroid()?))
}

enum Raced<T> {
    Done(T),
    Expired,
}

/// Bounded, cancellable polling loop over a [`RemoteQuery`].
pub struct StabilityGate<'a> {
    query: &'a dyn RemoteQuery,
    cancel: &'a CancelSignal,
}

impl<'a> StabilityGate<'a> {
    pub fn new(query: &'a dyn RemoteQuery, cancel: &'a CancelSignal) -> Self {
        Self { query, cancel }
    }

    /// Poll until `handle` is stable and visible, or until `timeout`.
    ///
    /// `seed` is a box model the caller already sampled; it counts as the
    /// first sample of the comparison.
    ///
    /// # Errors
    ///
    /// - [`BrowserError::ElementNotRendered`] as soon as a sample comes back empty.
    /// - [`BrowserError::WaitForStabilityTimeout`] once `timeout` is exceeded.
    /// - [`BrowserError::ElementHandleCancelled`] when the page context is torn down.
    pub async fn wait(
        &self,
        handle: &RemoteHandle,
        seed: Option<BoxModel>,
        timeout: Duration,
    ) -> Result<StableElement, BrowserError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut previous = seed.map(|m| m.content);
        let mut samples = 0u32;

        loop {
            let model = match self.race(handle, deadline, resolve_box_model(self.query, handle)).await? {
                Raced::Done(Some(model)) => model,
                Raced::Done(None) => {
                    return Err(BrowserError::ElementNotRendered {
                        handle: handle.to_string(),
                    })
                }
                Raced::Expired => return Err(self.expired(handle, started)),
            };
            samples += 1;

            if let Some(prev) = &previous {
                if is_stable(prev, &model.content) {
                    let viewport = match self.race(handle, deadline, self.query.current_viewport()).await? {
                        Raced::Done(viewport) => viewport,
                        Raced::Expired => return Err(self.expired(handle, started)),
                    };
                    if is_visible(target_quad(&model), &viewport)? {
                        tracing::debug!(
                            handle = %handle,
                            samples = samples,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "element stable and visible"
                        );
                        return Ok(StableElement {
                            model,
                            viewport,
                            samples,
                        });
                    }
                    tracing::trace!(handle = %handle, "element stable but not visible");
                } else {
                    tracing::trace!(handle = %handle, samples = samples, "element still moving");
                }
            }
            previous = Some(model.content);

            if self.cancel.is_cancelled() {
                return Err(self.cancelled(handle));
            }
            if Instant::now() >= deadline {
                return Err(self.expired(handle, started));
            }

            if let Raced::Expired = self.race(handle, deadline, self.query.next_frame()).await? {
                return Err(self.expired(handle, started));
            }
        }
    }

    async fn race<T, F>(
        &self,
        handle: &RemoteHandle,
        deadline: Instant,
        fut: F,
    ) -> Result<Raced<T>, BrowserError>
    where
        F: Future<Output = Result<T, BrowserError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled(handle));
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled(handle)),
            res = fut => res.map(Raced::Done),
            _ = tokio::time::sleep_until(deadline) => Ok(Raced::Expired),
        }
    }

    fn cancelled(&self, handle: &RemoteHandle) -> BrowserError {
        BrowserError::ElementHandleCancelled {
            handle: handle.to_string(),
        }
    }

    fn expired(&self, handle: &RemoteHandle, started: Instant) -> BrowserError {
        // Teardown that raced the deadline is still reported as cancellation.
        if self.cancel.is_cancelled() {
            return self.cancelled(handle);
        }
        let elapsed = started.elapsed();
        tracing::debug!(handle = %handle, elapsed_ms = elapsed.as_millis() as u64, "stability wait timed out");
        BrowserError::WaitForStabilityTimeout {
            handle: handle.to_string(),
            elapsed,
        }
    }
}
