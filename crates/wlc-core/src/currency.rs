use serde::{Deserialize, Serialize};

/// The platform's two non-fungible currencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Social-play currency. Purchasable, never withdrawable.
    Gold,
    /// Prize currency. Withdrawable, only ever enters via bonus/promo/AMOE.
    Sweeps,
}

impl Currency {
    pub fn withdrawable(&self) -> bool {
        matches!(self, Currency::Sweeps)
    }

    pub fn purchasable(&self) -> bool {
        matches!(self, Currency::Gold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Gold => "GOLD",
            Currency::Sweeps => "SWEEPS",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gold_is_purchasable_not_withdrawable() {
        assert!(Currency::Gold.purchasable());
        assert!(!Currency::Gold.withdrawable());
    }

    #[test]
    fn sweeps_is_withdrawable_not_purchasable() {
        assert!(Currency::Sweeps.withdrawable());
        assert!(!Currency::Sweeps.purchasable());
    }
}
