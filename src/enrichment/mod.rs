//! Enrichment module - resolves tracks to Echo Nest songs and fetches their acoustic attributes.
//!
//! # Architecture
//!
//! This module follows a clean separation between:
//! - **Domain models** (`domain.rs`) - Internal types that represent our business logic
//! - **API DTOs** (`echonest/dto.rs`) - Exact API response shapes
//! - **Adapters** - Convert DTOs to domain models
//! - **Clients** - HTTP client for the Echo Nest API
//! - **Retry** - Classified retries around every remote call
//! - **Fingerprint** - Echoprint codes via echoprint-codegen
//! - **Transcode** - Conversion to an uploadable format via ffmpeg
//! - **Strategies** - Profile, search, identify and analyze lookups
//! - **Service** - High-level orchestration of resolve and apply
//!
//! External tools and the remote API sit behind the traits in `traits.rs`,
//! so the pipeline runs against mocks in tests.
//!
//! # Usage
//!
//! ```ignore
//! use enrichment::{FetchOptions, FetchService};
//!
//! let service = FetchService::new(resolver, apply, attributes);
//! let summary = service.run(&mut tracks, &FetchOptions::default()).await;
//! println!("{} resolved, {} unresolved", summary.resolved, summary.unresolved);
//! ```

pub mod apply;
pub mod cache;
pub mod domain;
pub mod echonest;
pub mod fingerprint;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod strategies;
pub mod traits;
pub mod transcode;

pub use apply::{ApplyEngine, ApplyOutcome, ApplyReport, LibraryWriter};
pub use cache::MetadataCache;
pub use domain::{EnrichmentError, ErrorClass, ResolutionResult, Song};
pub use echonest::EchoNestClient;
pub use fingerprint::{EchoprintCodegen, FingerprintProvider, find_codegen};
pub use resolver::SongResolver;
pub use retry::{RETRIES, RETRY_INTERVAL, RetryPolicy, RetryingClient};
pub use service::{FetchOptions, FetchService, FetchSummary};
pub use strategies::{AnalyzeOptions, RetryingApi};
pub use transcode::FfmpegTranscoder;
