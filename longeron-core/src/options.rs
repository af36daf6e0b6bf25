//! Endpoint configuration options.
//!
//! Construction-time knobs shared by the framed writer and reader, in the
//! builder style of socket options.

use std::net::{Ipv4Addr, SocketAddr};

use crate::error::{LongeronError, Result};

/// Configuration for a framed endpoint.
///
/// # Examples
///
/// ```
/// use longeron_core::options::EndpointOptions;
///
/// let opts = EndpointOptions::default()
///     .with_max_message_size(8192)
///     .with_preallocated_state_objects(16);
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    /// Placeholder address carried by state objects before their first use,
    /// and the writer's implicit connect target.
    ///
    /// - Default: `127.0.0.1:0`
    pub default_endpoint: SocketAddr,

    /// Upper bound on payload bytes per frame.
    ///
    /// On the reader this doubles as the packet buffer size handed to the
    /// request handler. Frames declaring more than this are a hard protocol
    /// error. Must be non-zero.
    ///
    /// - Default: 8192 (8KB) - balanced for most workloads
    pub max_message_size: usize,

    /// Retention target of the transmission-buffer pool, per size class.
    ///
    /// - Default: 64 buffers per bucket
    pub pooled_buffers_per_bucket: usize,

    /// Warm size of the completion-state pool.
    ///
    /// - Default: 32 state objects
    pub preallocated_state_objects: usize,

    /// Disable Nagle's algorithm on every stream this endpoint opens or
    /// accepts. Essential for request-reply latency.
    ///
    /// - Default: true
    pub nodelay: bool,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            default_endpoint: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            max_message_size: 8192,
            pooled_buffers_per_bucket: 64,
            preallocated_state_objects: 32,
            nodelay: true,
        }
    }
}

impl EndpointOptions {
    #[must_use]
    pub fn with_default_endpoint(mut self, endpoint: SocketAddr) -> Self {
        self.default_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    #[must_use]
    pub fn with_pooled_buffers_per_bucket(mut self, count: usize) -> Self {
        self.pooled_buffers_per_bucket = count;
        self
    }

    #[must_use]
    pub fn with_preallocated_state_objects(mut self, count: usize) -> Self {
        self.preallocated_state_objects = count;
        self
    }

    #[must_use]
    pub fn with_nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Check the options for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `max_message_size` is zero or its frames
    /// would not fit a header's `u32` length field.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(LongeronError::invalid_config(
                "max_message_size must be > 0",
            ));
        }
        if self.max_message_size > u32::MAX as usize {
            return Err(LongeronError::invalid_config(
                "max_message_size must fit the u32 frame header",
            ));
        }
        Ok(())
    }
}
