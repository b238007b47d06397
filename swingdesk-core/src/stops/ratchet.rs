/// Ratchet for long stop levels.
///
/// **Core Rule:** a stop may tighten, never loosen (even if ATR expands).
///
/// An expanding ATR after a favourable move would otherwise pull a
/// volatility-based stop back down and widen the exposure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StopRatchet {
    /// High-water mark of the stop level
    current_level: Option<f64>,
}

impl StopRatchet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a previously persisted level (if any)
    pub fn from_level(level: Option<f64>) -> Self {
        Self {
            current_level: level.filter(|l| l.is_finite()),
        }
    }

    /// Apply the ratchet to a proposed level and return the ratcheted level.
    ///
    /// # Example
    /// ```
    /// use swingdesk_core::stops::StopRatchet;
    ///
    /// let mut ratchet = StopRatchet::from_level(Some(95.0));
    ///
    /// // Tightening: $95 → $100 (allowed)
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    ///
    /// // Loosening: $100 → $90 (blocked, stays at $100)
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        let ratcheted = match self.current_level {
            Some(current) => current.max(proposed),
            None => proposed,
        };
        self.current_level = Some(ratcheted);
        ratcheted
    }

    /// Strict form: raise to `proposed`, or return `Err(current)` if that
    /// would loosen. An equal level is accepted.
    pub fn try_raise(&mut self, proposed: f64) -> Result<f64, f64> {
        match self.current_level {
            Some(current) if proposed < current => Err(current),
            _ => {
                self.current_level = Some(proposed);
                Ok(proposed)
            }
        }
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratchet_tightening_allowed() {
        let mut ratchet = StopRatchet::from_level(Some(95.0));
        assert_eq!(ratchet.apply(100.0), 100.0);
        assert_eq!(ratchet.current_level(), Some(100.0));
    }

    #[test]
    fn test_ratchet_loosening_blocked() {
        let mut ratchet = StopRatchet::from_level(Some(100.0));
        assert_eq!(ratchet.apply(90.0), 100.0);
        assert_eq!(ratchet.current_level(), Some(100.0));
    }

    #[test]
    fn test_ratchet_initialization() {
        let mut ratchet = StopRatchet::new();
        assert_eq!(ratchet.current_level(), None);
        assert_eq!(ratchet.apply(95.0), 95.0);
        assert_eq!(ratchet.current_level(), Some(95.0));
    }

    #[test]
    fn test_ratchet_volatility_trap_scenario() {
        // Price rises to $110, ATR expands from $5 to $10:
        // proposed $110 - 2*$10 = $90 is looser than $95.
        let mut ratchet = StopRatchet::from_level(Some(95.0));
        assert_eq!(ratchet.apply(90.0), 95.0);
    }

    #[test]
    fn test_try_raise_rejects_loosening() {
        let mut ratchet = StopRatchet::from_level(Some(100.0));
        assert_eq!(ratchet.try_raise(99.5), Err(100.0));
        assert_eq!(ratchet.try_raise(100.0), Ok(100.0));
        assert_eq!(ratchet.try_raise(101.0), Ok(101.0));
        assert_eq!(ratchet.current_level(), Some(101.0));
    }

    #[test]
    fn test_nan_seed_is_ignored() {
        let ratchet = StopRatchet::from_level(Some(f64::NAN));
        assert_eq!(ratchet.current_level(), None);
    }
}
