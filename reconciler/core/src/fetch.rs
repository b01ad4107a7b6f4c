use crate::Tracked;
use anyhow::Result;
use std::{future::Future, marker::PhantomData, sync::Arc};

/// Re-reads a resource's current server representation.
#[async_trait::async_trait]
pub trait FetchResource<R: Tracked>: Send + Sync + 'static {
    /// Fetches the resource identified by `id`.
    ///
    /// Returns `Ok(None)` if the resource no longer exists. Errors are treated
    /// as transient by callers.
    async fn fetch(&self, id: &R::Id) -> Result<Option<R>>;
}

/// Adapts an async closure into a [`FetchResource`].
pub struct FetchFn<F, R> {
    f: F,
    _marker: PhantomData<fn() -> R>,
}

// === impl FetchFn ===

impl<F, R> FetchFn<F, R> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<F: Clone, R> Clone for FetchFn<F, R> {
    fn clone(&self) -> Self {
        Self::new(self.f.clone())
    }
}

#[async_trait::async_trait]
impl<F, Fut, R> FetchResource<R> for FetchFn<F, R>
where
    R: Tracked,
    F: Fn(R::Id) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<R>>> + Send + 'static,
{
    async fn fetch(&self, id: &R::Id) -> Result<Option<R>> {
        (self.f)(id.clone()).await
    }
}

#[async_trait::async_trait]
impl<R, F> FetchResource<R> for Arc<F>
where
    R: Tracked,
    F: FetchResource<R> + ?Sized,
{
    async fn fetch(&self, id: &R::Id) -> Result<Option<R>> {
        (**self).fetch(id).await
    }
}
