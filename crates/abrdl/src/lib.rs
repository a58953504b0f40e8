//! Adaptive bitrate download of MPEG-DASH on-demand presentations.
//!
//! ```text
//!  manifest ──► catalog ──► selector ──► resolver ──► transport ──► storage
//!                              ▲                          │
//!                              └──────── estimator ◄──────┘
//! ```
//!
//! A [`session::SegmentFetchLoop`] repeatedly reads the [`estimator::BandwidthEstimator`], asks a
//! [`selector::RepresentationSelector`] for the representation that fits it, renders the segment
//! address with an [`address::AddressResolver`], fetches it through a
//! [`transport::SegmentTransport`] and persists it in a [`storage::SegmentStorage`].

pub mod address;
pub mod catalog;
pub mod error;
pub mod estimator;
pub mod manifest;
pub mod selector;
pub mod session;
pub mod storage;
pub mod template;
pub mod transport;
pub mod util;

pub use address::{AddressResolver, SegmentAddress};
pub use catalog::{Representation, RepresentationCatalog};
pub use error::{AbrError, AbrResult, ErrorKind};
pub use estimator::BandwidthEstimator;
pub use manifest::{load_catalog, ManifestLocation};
pub use selector::{FixedSelector, RepresentationSelector, ThroughputSelector};
pub use session::{SegmentFetchLoop, SessionConfig, SessionSummary};
pub use storage::{AbrStorage, SegmentStorage};
pub use transport::{FetchedSegment, HttpTransport, RetryPolicy, SegmentTransport};
pub use util::http::HttpClient;
