//! Activities
//!
//! An activity is the unit-of-work target a fan-out invokes once per input.
//! The scheduler never looks inside an activity; it only relies on the
//! [`Activity::invoke`] capability.
//!
//! # Adapters
//!
//! - [`FnActivity`]: wraps an async closure
//! - [`shell::ShellActivity`]: runs a shell command template per input

pub mod shell;

use std::future::Future;

use async_trait::async_trait;

use crate::fanout::BoxError;

pub use shell::ShellActivity;

/// Capability to run one unit of work against one input.
#[async_trait]
pub trait Activity<T, R>: Send + Sync {
    /// Name used in log messages.
    fn name(&self) -> &str {
        "activity"
    }

    /// Runs the unit of work for `input`.
    async fn invoke(&self, input: T) -> Result<R, BoxError>;
}

/// Activity backed by an async closure.
///
/// # Example
///
/// ```rust
/// use fanrunner::activity::{Activity, FnActivity};
/// use fanrunner::fanout::BoxError;
///
/// # async fn demo() {
/// let double = FnActivity::new("double", |x: i64| async move { Ok::<_, BoxError>(x * 2) });
/// assert_eq!(double.invoke(21).await.unwrap(), 42);
/// # }
/// ```
pub struct FnActivity<F> {
    name: String,
    func: F,
}

impl<F> FnActivity<F> {
    /// Wraps `func` under the given name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<T, R, F, Fut> Activity<T, R> for FnActivity<F>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, BoxError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: T) -> Result<R, BoxError> {
        (self.func)(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_activity_invoke() {
        let activity = FnActivity::new("double", |x: i32| async move { Ok::<_, BoxError>(x * 2) });

        assert_eq!(Activity::<i32, i32>::name(&activity), "double");
        assert_eq!(activity.invoke(4).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_fn_activity_error() {
        let activity = FnActivity::new("fail", |_: i32| async move {
            Err::<i32, BoxError>("boom".into())
        });

        let err = activity.invoke(1).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_fn_activity_as_trait_object() {
        let activity: Box<dyn Activity<String, usize>> = Box::new(FnActivity::new(
            "len",
            |s: String| async move { Ok::<_, BoxError>(s.len()) },
        ));

        assert_eq!(activity.invoke("four".to_string()).await.unwrap(), 4);
        assert_eq!(activity.name(), "len");
    }
}
