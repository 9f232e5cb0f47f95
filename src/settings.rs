//! Peer settings snapshots
//!
//! The connection owns the SETTINGS exchange (RFC 7540 Section 6.5) and
//! keeps a [`SettingsSync`] handle current as parameters arrive; streams
//! fetch read-only snapshots from it, in practice only to learn
//! `max_frame_size` on the send path.

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// SETTINGS_HEADER_TABLE_SIZE identifier (RFC 7540 Section 6.5.2)
pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
/// SETTINGS_ENABLE_PUSH identifier
pub const SETTINGS_ENABLE_PUSH: u16 = 0x2;
/// SETTINGS_MAX_CONCURRENT_STREAMS identifier
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
/// SETTINGS_INITIAL_WINDOW_SIZE identifier
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
/// SETTINGS_MAX_FRAME_SIZE identifier
pub const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
/// SETTINGS_MAX_HEADER_LIST_SIZE identifier
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

/// One endpoint's view of the peer's settings.
///
/// Starts at the RFC 7540 initial values; the connection folds received
/// parameters in with [`Settings::apply`]. Parameters that default to
/// "unlimited" stay `None` until the peer announces a cap.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HPACK dynamic table ceiling
    pub header_table_size: u32,
    /// Whether the peer may push
    pub enable_push: bool,
    /// Concurrent stream cap
    pub max_concurrent_streams: Option<u32>,
    /// Stream-level flow control window at stream creation
    pub initial_window_size: u32,
    /// Largest frame payload the peer accepts
    pub max_frame_size: u32,
    /// Advisory cap on the uncompressed header list
    pub max_header_list_size: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            header_table_size: crate::DEFAULT_HEADER_TABLE_SIZE,
            enable_push: true,
            max_concurrent_streams: None,
            initial_window_size: crate::DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: crate::DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: None,
        }
    }
}

impl Settings {
    /// Fold one received parameter into the snapshot.
    ///
    /// Identifiers this implementation does not know are dropped, as
    /// RFC 7540 Section 6.5.2 requires.
    pub fn apply(&mut self, identifier: u16, value: u32) {
        match identifier {
            SETTINGS_HEADER_TABLE_SIZE => self.header_table_size = value,
            SETTINGS_ENABLE_PUSH => self.enable_push = value != 0,
            SETTINGS_MAX_CONCURRENT_STREAMS => self.max_concurrent_streams = Some(value),
            SETTINGS_INITIAL_WINDOW_SIZE => self.initial_window_size = value,
            SETTINGS_MAX_FRAME_SIZE => self.max_frame_size = value,
            SETTINGS_MAX_HEADER_LIST_SIZE => self.max_header_list_size = Some(value),
            _ => {}
        }
    }

    /// Bounds checks for negotiated values
    pub fn validate(&self) -> Result<()> {
        if self.initial_window_size > 0x7FFF_FFFF {
            return Err(Error::InvalidSettings(format!(
                "SETTINGS_INITIAL_WINDOW_SIZE {} above 2^31-1",
                self.initial_window_size
            )));
        }
        if !(16_384..=16_777_215).contains(&self.max_frame_size) {
            return Err(Error::InvalidSettings(format!(
                "SETTINGS_MAX_FRAME_SIZE {} outside 2^14..2^24-1",
                self.max_frame_size
            )));
        }

        Ok(())
    }
}

/// Shared handle to the peer's current settings.
///
/// Snapshots are plain copies, so a stream never observes a half-applied
/// SETTINGS frame.
#[derive(Clone, Default)]
pub struct SettingsSync {
    inner: Arc<Mutex<Settings>>,
}

impl SettingsSync {
    /// Create a handle holding the given settings
    pub fn new(settings: Settings) -> Self {
        SettingsSync {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    /// Fetch a snapshot of the current settings
    pub fn fetch(&self) -> Settings {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fold one received parameter into the shared settings
    pub fn apply(&self, identifier: u16, value: u32) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(identifier, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_values() {
        let settings = Settings::default();
        assert_eq!(settings.header_table_size, 4096);
        assert!(settings.enable_push);
        assert_eq!(settings.max_concurrent_streams, None);
        assert_eq!(settings.initial_window_size, 65535);
        assert_eq!(settings.max_frame_size, 16384);
        assert_eq!(settings.max_header_list_size, None);
    }

    #[test]
    fn test_apply_parameters() {
        let mut settings = Settings::default();

        settings.apply(SETTINGS_MAX_FRAME_SIZE, 65536);
        settings.apply(SETTINGS_ENABLE_PUSH, 0);
        settings.apply(SETTINGS_MAX_CONCURRENT_STREAMS, 100);

        assert_eq!(settings.max_frame_size, 65536);
        assert!(!settings.enable_push);
        assert_eq!(settings.max_concurrent_streams, Some(100));
        // Untouched parameters keep their defaults
        assert_eq!(settings.initial_window_size, 65535);
    }

    #[test]
    fn test_unknown_identifier_is_dropped() {
        let mut settings = Settings::default();
        let before = settings.clone();

        settings.apply(0xff, 1);

        assert_eq!(settings.max_frame_size, before.max_frame_size);
        assert_eq!(settings.header_table_size, before.header_table_size);
        assert_eq!(settings.enable_push, before.enable_push);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(Settings::default().validate().is_ok());

        let mut settings = Settings::default();
        settings.initial_window_size = 0x8000_0000;
        assert!(matches!(
            settings.validate(),
            Err(Error::InvalidSettings(_))
        ));

        let mut settings = Settings::default();
        settings.max_frame_size = 1024;
        assert!(settings.validate().is_err());

        settings.max_frame_size = 16_777_216;
        assert!(settings.validate().is_err());

        settings.max_frame_size = 16_777_215;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_sync_snapshots_are_isolated() {
        let sync = SettingsSync::default();
        assert_eq!(sync.fetch().max_frame_size, 16384);

        let snapshot = sync.fetch();
        sync.apply(SETTINGS_MAX_FRAME_SIZE, 65536);

        // The handle sees the update, the earlier snapshot does not
        assert_eq!(sync.fetch().max_frame_size, 65536);
        assert_eq!(snapshot.max_frame_size, 16384);
    }
}
