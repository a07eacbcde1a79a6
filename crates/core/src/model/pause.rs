use std::fmt;

/// Why a running batch is on hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PauseReason {
    /// The window lost focus.
    FocusLost,
    /// A wrong answer is waiting for acknowledgment.
    MistakePopup,
    /// Some other overlay (e.g. a definition lookup) holds the session.
    ExternalModal,
}

impl PauseReason {
    const fn bit(self) -> u8 {
        match self {
            PauseReason::FocusLost => 0b001,
            PauseReason::MistakePopup => 0b010,
            PauseReason::ExternalModal => 0b100,
        }
    }
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PauseReason::FocusLost => "focus lost",
            PauseReason::MistakePopup => "mistake popup",
            PauseReason::ExternalModal => "external modal",
        };
        f.write_str(label)
    }
}

/// Set of independent pause reasons. The session runs only while it is empty.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PauseReasons(u8);

impl PauseReasons {
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    /// Adds `reason`; returns `true` if it was not already set.
    pub fn insert(&mut self, reason: PauseReason) -> bool {
        let was_set = self.contains(reason);
        self.0 |= reason.bit();
        !was_set
    }

    /// Clears `reason`; returns `true` if it was set.
    pub fn remove(&mut self, reason: PauseReason) -> bool {
        let was_set = self.contains(reason);
        self.0 &= !reason.bit();
        was_set
    }

    #[must_use]
    pub const fn contains(self, reason: PauseReason) -> bool {
        self.0 & reason.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = PauseReason> {
        [
            PauseReason::FocusLost,
            PauseReason::MistakePopup,
            PauseReason::ExternalModal,
        ]
        .into_iter()
        .filter(move |reason| self.contains(*reason))
    }
}

impl fmt::Debug for PauseReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_independent() {
        let mut reasons = PauseReasons::none();
        assert!(reasons.insert(PauseReason::MistakePopup));
        assert!(reasons.insert(PauseReason::FocusLost));
        assert!(!reasons.insert(PauseReason::FocusLost));

        assert!(reasons.remove(PauseReason::FocusLost));
        assert!(!reasons.is_empty());
        assert!(reasons.contains(PauseReason::MistakePopup));

        assert!(reasons.remove(PauseReason::MistakePopup));
        assert!(reasons.is_empty());
        assert!(!reasons.remove(PauseReason::MistakePopup));
    }

    #[test]
    fn debug_lists_active_reasons() {
        let mut reasons = PauseReasons::none();
        reasons.insert(PauseReason::ExternalModal);
        assert_eq!(format!("{reasons:?}"), "{ExternalModal}");
    }
}
