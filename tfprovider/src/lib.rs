//! # TFProvider
//!
//! HTTP clients for the platforms aggregated by TuneFuse, all exposed as
//! [`tfsource::MusicProvider`] implementations.
//!
//! - [`NeteaseProvider`]: NetEase-compatible REST API (primary and mirrors)
//! - [`YouTubeProvider`]: YouTube Music proxy, also used for `kugou`
//!   endpoints
//!
//! Every request carries the endpoint timeout; network-level failures are
//! retried once after a fixed backoff ([`RetryPolicy`]).
//!
//! ## Usage
//!
//! ```no_run
//! use tfprovider::build_providers;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = tfconfig::get_config().get_engine_settings()?;
//! let providers = build_providers(&settings)?;
//! for provider in &providers {
//!     println!("{} -> {}", provider.id(), provider.base_url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
mod http;
pub mod netease;
pub mod retry;
pub mod youtube;

pub use builder::{build_providers, ProviderBuilder, DEFAULT_USER_AGENT};
pub use error::{BuildError, BuildResult};
pub use netease::NeteaseProvider;
pub use retry::RetryPolicy;
pub use youtube::YouTubeProvider;
