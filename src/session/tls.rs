//! Control channel protection state
//!
//! The only legal paths are Plain -> Upgrading -> Secure (AUTH) and
//! Secure -> Upgrading -> Plain (CCC). A failed AUTH handshake falls back
//! from Upgrading to Plain.

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsState {
    #[default]
    Plain,
    Upgrading,
    Secure,
}

/// Tracks the current state and where an in-flight switch started from.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TlsTracker {
    state: TlsState,
    origin: Option<TlsState>,
}

impl TlsTracker {
    pub(crate) fn state(&self) -> TlsState {
        self.state
    }

    /// Enters `Upgrading` from either stable state.
    pub(crate) fn prepare(&mut self) -> Result<(), SessionError> {
        match self.state {
            TlsState::Plain | TlsState::Secure => {
                self.origin = Some(self.state);
                self.state = TlsState::Upgrading;
                Ok(())
            }
            TlsState::Upgrading => Err(SessionError::IllegalTlsTransition {
                from: TlsState::Upgrading,
                to: TlsState::Upgrading,
            }),
        }
    }

    /// Upgrading (from Plain) -> Secure.
    pub(crate) fn secure(&mut self) -> Result<(), SessionError> {
        self.finish(TlsState::Plain, TlsState::Secure)
    }

    /// Upgrading (from Secure) -> Plain.
    pub(crate) fn downgrade(&mut self) -> Result<(), SessionError> {
        self.finish(TlsState::Secure, TlsState::Plain)
    }

    /// Upgrading (from Plain) -> Plain after a failed handshake.
    pub(crate) fn abort_upgrade(&mut self) -> Result<(), SessionError> {
        self.finish(TlsState::Plain, TlsState::Plain)
    }

    fn finish(&mut self, expected_origin: TlsState, to: TlsState) -> Result<(), SessionError> {
        if self.state != TlsState::Upgrading || self.origin != Some(expected_origin) {
            return Err(SessionError::IllegalTlsTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.origin = None;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
