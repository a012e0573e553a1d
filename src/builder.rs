//! Proxy builder and capacity configuration.

use crate::error::{Error, Result};
use crate::proxy::{HostSockets, SocketProxy};

/// Default number of descriptor slots.
pub const DEFAULT_MAX_DESCRIPTORS: usize = 64;

/// Default address staging capacity: one `sockaddr_in`.
pub const DEFAULT_MAX_ADDR_LEN: usize = std::mem::size_of::<libc::sockaddr_in>();

/// Default data staging capacity for a single send or recv.
pub const DEFAULT_MAX_TRANSFER: usize = 4096;

/// Largest address staging capacity the host can ever make use of.
pub const SOCKADDR_STORAGE_LEN: usize = std::mem::size_of::<libc::sockaddr_storage>();

/// Fixed capacities enforced by a [`SocketProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Number of descriptor slots visible to the guest.
    pub max_descriptors: usize,
    /// Maximum address length accepted by bind, connect and accept.
    pub max_addr_len: usize,
    /// Maximum byte count for a single send or recv.
    pub max_transfer: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
            max_addr_len: DEFAULT_MAX_ADDR_LEN,
            max_transfer: DEFAULT_MAX_TRANSFER,
        }
    }
}

impl ProxyConfig {
    /// Defaults overlaid with `GUESTSOCK_MAX_FDS`, `GUESTSOCK_MAX_ADDR` and
    /// `GUESTSOCK_MAX_TRANSFER` when they are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(n) = env_usize("GUESTSOCK_MAX_FDS")? {
            config.max_descriptors = n;
        }
        if let Some(n) = env_usize("GUESTSOCK_MAX_ADDR")? {
            config.max_addr_len = n;
        }
        if let Some(n) = env_usize("GUESTSOCK_MAX_TRANSFER")? {
            config.max_transfer = n;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that every capacity is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_descriptors == 0 {
            return Err(Error::InvalidConfig("max_descriptors must be > 0".to_string()));
        }
        // Handles are i32 on the guest side.
        if self.max_descriptors > i32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_descriptors {} does not fit a guest handle",
                self.max_descriptors
            )));
        }
        if self.max_addr_len == 0 || self.max_addr_len > SOCKADDR_STORAGE_LEN {
            return Err(Error::InvalidConfig(format!(
                "max_addr_len must be in 1..={}, got {}",
                SOCKADDR_STORAGE_LEN, self.max_addr_len
            )));
        }
        if self.max_transfer == 0 {
            return Err(Error::InvalidConfig("max_transfer must be > 0".to_string()));
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{} is not a number: {:?}", name, val))),
        Err(_) => Ok(None),
    }
}

/// Builder for creating a [`SocketProxy`].
///
/// # Example
///
/// ```rust,no_run
/// # #[cfg(unix)] {
/// use guestsock::{LibcSockets, SocketProxy};
///
/// let proxy = SocketProxy::builder()
///     .max_descriptors(16)
///     .max_transfer(8192)
///     .build(LibcSockets)?;
/// # }
/// # Ok::<(), guestsock::Error>(())
/// ```
#[derive(Default)]
pub struct ProxyBuilder {
    max_descriptors: Option<usize>,
    max_addr_len: Option<usize>,
    max_transfer: Option<usize>,
}

impl ProxyBuilder {
    /// Create a new proxy builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ProxyConfig) -> Self {
        Self {
            max_descriptors: Some(config.max_descriptors),
            max_addr_len: Some(config.max_addr_len),
            max_transfer: Some(config.max_transfer),
        }
    }

    /// Set the number of descriptor slots.
    ///
    /// Default: 64
    pub fn max_descriptors(mut self, count: usize) -> Self {
        self.max_descriptors = Some(count);
        self
    }

    /// Set the address staging capacity in bytes.
    ///
    /// Default: `size_of::<sockaddr_in>()`
    pub fn max_addr_len(mut self, len: usize) -> Self {
        self.max_addr_len = Some(len);
        self
    }

    /// Set the data staging capacity in bytes.
    ///
    /// Default: 4096
    pub fn max_transfer(mut self, len: usize) -> Self {
        self.max_transfer = Some(len);
        self
    }

    /// Resolve the configuration without building a proxy.
    pub fn config(&self) -> Result<ProxyConfig> {
        let config = ProxyConfig {
            max_descriptors: self.max_descriptors.unwrap_or(DEFAULT_MAX_DESCRIPTORS),
            max_addr_len: self.max_addr_len.unwrap_or(DEFAULT_MAX_ADDR_LEN),
            max_transfer: self.max_transfer.unwrap_or(DEFAULT_MAX_TRANSFER),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the proxy on top of the given host socket service.
    pub fn build<H: HostSockets>(self, host: H) -> Result<SocketProxy<H>> {
        let config = self.config()?;
        Ok(SocketProxy::with_config(host, config))
    }
}
