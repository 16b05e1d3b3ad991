//! # TFResolver
//!
//! Turns a set of unreliable music APIs into one reliable operation: give
//! it a track key, get back a playable URL that was just checked, or a
//! typed failure listing what every provider did.
//!
//! ## Architecture
//!
//! ```text
//! MusicService
//!  ├── Aggregator ─────────────► every provider (search, hot tracks)
//!  │                            platform providers (browse, first success)
//!  ├── PreloadScheduler ──┐
//!  └── resolve_key ───────┴──► Resolver ── Cache<TrackKey, ResolvedUrl>
//!                                  │  (in-flight coalescing)
//!                                  └──► FailoverRouter ── ProviderRegistry
//!                                            └──► UrlValidator
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use tfresolver::MusicService;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = tfconfig::get_config().get_engine_settings()?;
//! let service = MusicService::from_settings(settings)?;
//!
//! let tracks = service.search("jay chou").await?;
//! if let Some(first) = tracks.first() {
//!     let resolved = service.play(&tracks, 0).await?;
//!     println!("{} -> {} (via {})", first.name, resolved.url, resolved.provider);
//! }
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod preload;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod service;
pub mod validator;

pub use aggregator::Aggregator;
pub use cache::{Cache, CacheStats};
pub use error::{AttemptFailure, FailureReason, ResolveError, ServiceError};
pub use preload::{EnqueueOutcome, PreloadPriority, PreloadScheduler, PreloadTask};
pub use registry::{ProviderDescriptor, ProviderRegistry};
pub use resolver::{ResolveResult, Resolver};
pub use router::{FailoverRouter, ResolvedUrl};
pub use service::{parse_track_key, MusicService, ServiceStats};
pub use validator::{HttpValidator, UrlValidator};
