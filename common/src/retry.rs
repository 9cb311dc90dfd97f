use std::{fmt::Debug, time::Duration};

use tracing::{debug, warn};

const DEFAULT_MAX_ATTEMPTS: usize = 4;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(20);

/// Implemented by transport errors that know whether retrying makes sense.
pub trait Retryable {
	fn is_retryable(&self) -> bool {
		false
	}
}

#[derive(Debug, Eq, PartialEq)]
pub enum Retry<E> {
	Permanent(E),
	Transient(E),
}

impl<E> Retry<E> {
	pub fn into_inner(self) -> E {
		match self {
			Self::Transient(error) => error,
			Self::Permanent(error) => error,
		}
	}
}

impl<E> Retryable for Retry<E> {
	fn is_retryable(&self) -> bool {
		matches!(self, Retry::Transient(_))
	}
}

/// Exponential-backoff-with-full-jitter retry policy.
///
/// `max_attempts` counts the initial attempt, so `max_attempts = 4` performs
/// up to 3 retries, matching §4.E's "retry up to N times, N in [0,5], default
/// 3" (N retries = `max_attempts - 1`).
#[derive(Debug, Clone, Copy)]
pub struct RetryParams {
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub max_attempts: usize,
}

impl Default for RetryParams {
	fn default() -> Self {
		Self {
			base_delay: DEFAULT_BASE_DELAY,
			max_delay: DEFAULT_MAX_DELAY,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
		}
	}
}

impl RetryParams {
	pub fn with_max_retries(max_retries: usize) -> Self {
		Self { max_attempts: max_retries + 1, ..Default::default() }
	}

	/// Computes the delay before the next attempt (full jitter, AWS-SDK derived).
	/// See <https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/>.
	///
	/// # Panics
	/// Panics if `num_attempts` is zero.
	pub fn compute_delay(&self, num_attempts: usize) -> Duration {
		assert!(num_attempts > 0, "num_attempts should be greater than zero");

		let delay_ms = self.base_delay.as_millis() as u64 * 2u64.pow(num_attempts as u32 - 1);
		let ceil_delay_ms = delay_ms.min(self.max_delay.as_millis() as u64);
		let half_delay_ms = ceil_delay_ms / 2;
		let jitter_range = 0..half_delay_ms + 1;
		let jittered_delay_ms = half_delay_ms + rand::thread_rng().gen_range(jitter_range);
		Duration::from_millis(jittered_delay_ms)
	}

	#[cfg(any(test, feature = "testsuite"))]
	pub fn for_test() -> Self {
		Self {
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(2),
			..Default::default()
		}
	}
}

#[async_trait::async_trait]
pub trait MockableSleep: Send + Sync {
	async fn sleep(&self, duration: Duration);
}

pub struct TokioSleep;

#[async_trait::async_trait]
impl MockableSleep for TokioSleep {
	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// Runs `f` until it succeeds, the error is not retryable, or `max_attempts`
/// has been reached. Honors an explicit `retry_after` override (e.g. from the
/// SoR's `Retry-After` header) for the next delay when the closure supplies one.
pub async fn retry_with_mockable_sleep<U, E, Fut>(
	retry_params: &RetryParams,
	f: impl Fn(usize) -> Fut,
	mockable_sleep: impl MockableSleep,
) -> Result<U, E>
where
	Fut: std::future::Future<Output = Result<U, (E, Option<Duration>)>>,
	E: Retryable + Debug + 'static,
{
	let mut num_attempts = 0;

	loop {
		num_attempts += 1;
		let response = f(num_attempts).await;

		let (error, retry_after) = match response {
			Ok(response) => return Ok(response),
			Err(error) => error,
		};
		if !error.is_retryable() || num_attempts >= retry_params.max_attempts {
			warn!(num_attempts = %num_attempts, error = ?error, "request failed, giving up");
			return Err(error);
		}
		let delay = retry_after.unwrap_or_else(|| retry_params.compute_delay(num_attempts));
		debug!(
			num_attempts = %num_attempts,
			delay_ms = %delay.as_millis(),
			error = ?error,
			"request failed, retrying"
		);
		mockable_sleep.sleep(delay).await;
	}
}

pub async fn retry<U, E, Fut>(
	retry_params: &RetryParams,
	f: impl Fn(usize) -> Fut,
) -> Result<U, E>
where
	Fut: std::future::Future<Output = Result<U, (E, Option<Duration>)>>,
	E: Retryable + Debug + 'static,
{
	retry_with_mockable_sleep(retry_params, f, TokioSleep).await
}
