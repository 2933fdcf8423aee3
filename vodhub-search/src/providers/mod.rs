//! Provider adapter implementations.
//!
//! Each module provides a struct implementing [`crate::provider::Provider`]
//! for one family of upstream APIs.

pub mod cms;

pub use cms::CmsProvider;
