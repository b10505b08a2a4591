//! Application state shared across handlers.

use std::sync::Arc;

#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
use rollcall_core::BluezRadio;
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
use rollcall_core::MockRadio;
use rollcall_core::{Radio, RollcallConfig, ScanSession};

/// State handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Shared application state.
///
/// The agent owns exactly one [`ScanSession`]; handlers drive it through
/// its own synchronisation, so no outer lock is needed.
pub struct AppState {
    /// The scan session.
    pub session: ScanSession,
    /// The configuration the session was built from.
    pub config: RollcallConfig,
    /// Name of the radio backend in use.
    pub radio_backend: &'static str,
    /// Handle for injecting simulated discovery events.
    #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
    pub mock_radio: Arc<MockRadio>,
}

impl AppState {
    /// Build state around the platform radio selected at compile time.
    ///
    /// # Errors
    ///
    /// Returns an error if the attendance service client cannot be built.
    pub fn from_config(config: RollcallConfig) -> rollcall_core::Result<Self> {
        #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
        {
            Self::with_mock_radio(config, Arc::new(MockRadio::new()))
        }
        #[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
        {
            let radio: Arc<dyn Radio> = Arc::new(BluezRadio::new());
            let session = ScanSession::from_config(radio, &config)?;
            Ok(Self {
                session,
                config,
                radio_backend: "bluez",
            })
        }
    }

    /// Build state around a caller-supplied mock radio.
    ///
    /// # Errors
    ///
    /// Returns an error if the attendance service client cannot be built.
    #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
    pub fn with_mock_radio(
        config: RollcallConfig,
        mock_radio: Arc<MockRadio>,
    ) -> rollcall_core::Result<Self> {
        let radio: Arc<dyn Radio> = Arc::clone(&mock_radio) as Arc<dyn Radio>;
        let session = ScanSession::from_config(radio, &config)?;
        Ok(Self {
            session,
            config,
            radio_backend: "mock",
            mock_radio,
        })
    }

    /// Wrap in the shared handle.
    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
