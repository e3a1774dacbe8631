//! Authentication context and user-facing alerts.

use serde::{Deserialize, Serialize};

use crate::{FracshareError, PropertyId, Result, UserId};

/// The acting user, as resolved by the external authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    #[must_use]
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// # Errors
    /// `Forbidden` unless the actor is an admin.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(FracshareError::Forbidden {
                reason: format!("{action} requires an admin"),
            })
        }
    }

    /// # Errors
    /// `Forbidden` unless the actor is `owner` or an admin.
    pub fn require_owner_or_admin(&self, owner: UserId, action: &str) -> Result<()> {
        if self.is_admin || self.user_id == owner {
            Ok(())
        } else {
            Err(FracshareError::Forbidden {
                reason: format!("only the owner or an admin may {action}"),
            })
        }
    }

    /// # Errors
    /// `Forbidden` unless the actor is exactly `party`.
    pub fn require_party(&self, party: UserId, action: &str) -> Result<()> {
        if self.user_id == party {
            Ok(())
        } else {
            Err(FracshareError::Forbidden {
                reason: format!("only the counterparty may {action}"),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    PurchaseCompleted,
    SaleCompleted,
    HoldPlaced,
    HoldAwaitingSeller,
    ReservationCreated,
    ReservationSettled,
    ReservationCancelled,
    HoldExpired,
    ReservationExpired,
    OrderExpired,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PurchaseCompleted => "PURCHASE_COMPLETED",
            Self::SaleCompleted => "SALE_COMPLETED",
            Self::HoldPlaced => "HOLD_PLACED",
            Self::HoldAwaitingSeller => "HOLD_AWAITING_SELLER",
            Self::ReservationCreated => "RESERVATION_CREATED",
            Self::ReservationSettled => "RESERVATION_SETTLED",
            Self::ReservationCancelled => "RESERVATION_CANCELLED",
            Self::HoldExpired => "HOLD_EXPIRED",
            Self::ReservationExpired => "RESERVATION_EXPIRED",
            Self::OrderExpired => "ORDER_EXPIRED",
        };
        f.write_str(s)
    }
}

/// Fire-and-forget notification for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub user_id: UserId,
    pub alert_type: AlertType,
    pub title: String,
    pub message: String,
    pub property_id: PropertyId,
}

impl Alert {
    #[must_use]
    pub fn new(
        user_id: UserId,
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
        property_id: PropertyId,
    ) -> Self {
        Self {
            user_id,
            alert_type,
            title: title.into(),
            message: message.into(),
            property_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_passes_every_guard() {
        let admin = Actor::admin(UserId::new());
        assert!(admin.require_admin("settle").is_ok());
        assert!(admin.require_owner_or_admin(UserId::new(), "cancel").is_ok());
    }

    #[test]
    fn plain_user_is_limited_to_own_rows() {
        let me = UserId::new();
        let actor = Actor::user(me);
        assert!(matches!(
            actor.require_admin("settle"),
            Err(FracshareError::Forbidden { .. })
        ));
        assert!(actor.require_owner_or_admin(me, "cancel").is_ok());
        assert!(actor.require_owner_or_admin(UserId::new(), "cancel").is_err());
        assert!(actor.require_party(UserId::new(), "confirm").is_err());
    }
}
