use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How the guest intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(PaymentMethod::Cash),
            "transfer" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PendingPayment,
    CashOnDelivery,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    Expired,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Order is already {0}")]
    Terminal(OrderStatus),

    #[error("Cannot move order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },

    #[error("Unknown order status '{0}'")]
    UnknownStatus(String),
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::PendingPayment,
        OrderStatus::CashOnDelivery,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::CashOnDelivery => "cash_on_delivery",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Result<Self, TransitionError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| TransitionError::UnknownStatus(value.to_string()))
    }

    /// Status a new order starts in.
    pub fn initial(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => OrderStatus::CashOnDelivery,
            PaymentMethod::Transfer => OrderStatus::PendingPayment,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Expired)
    }

    /// Still waiting for the venue to accept it (payment or confirmation).
    pub fn is_awaiting_confirmation(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::PendingPayment | OrderStatus::CashOnDelivery
        )
    }

    /// Staff-facing next steps, in the order the dashboard offers them.
    pub fn next_actions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending | PendingPayment | CashOnDelivery => &[Confirmed, Cancelled, Expired],
            Confirmed => &[Preparing, Cancelled, Expired],
            Preparing => &[Ready, Cancelled, Expired],
            Ready => &[Completed, Cancelled, Expired],
            Completed | Cancelled | Expired => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.next_actions().contains(&next)
    }

    /// Validate a staff transition request.
    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if !self.can_transition_to(next) {
            return Err(TransitionError::NotAllowed { from: self, to: next });
        }
        Ok(next)
    }

    /// Guests may only withdraw an order the venue has not accepted yet.
    pub fn guest_cancel(self) -> Result<OrderStatus, TransitionError> {
        if self.is_awaiting_confirmation() {
            Ok(OrderStatus::Cancelled)
        } else if self.is_terminal() {
            Err(TransitionError::Terminal(self))
        } else {
            Err(TransitionError::NotAllowed { from: self, to: OrderStatus::Cancelled })
        }
    }

    /// Staff confirmation of a transfer moves an awaiting order forward; other
    /// live orders only get the confirmation flag.
    pub fn after_payment_confirmed(self) -> Result<OrderStatus, TransitionError> {
        match self {
            OrderStatus::Pending | OrderStatus::PendingPayment => Ok(OrderStatus::Confirmed),
            s if s.is_terminal() => Err(TransitionError::Terminal(s)),
            s => Ok(s),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cash_orders_start_cash_on_delivery() {
        assert_eq!(OrderStatus::initial(PaymentMethod::Cash), OrderStatus::CashOnDelivery);
        assert_ne!(OrderStatus::initial(PaymentMethod::Cash), OrderStatus::PendingPayment);
        assert_eq!(OrderStatus::initial(PaymentMethod::Transfer), OrderStatus::PendingPayment);
    }

    #[test]
    fn happy_path_walks_to_completed() {
        let mut status = OrderStatus::initial(PaymentMethod::Cash);
        for next in [OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Completed] {
            status = status.transition(next).unwrap();
        }
        assert!(status.is_terminal());
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(status.next_actions().is_empty());
            for next in OrderStatus::ALL {
                assert_eq!(status.transition(next), Err(TransitionError::Terminal(status)));
            }
        }
    }

    #[test]
    fn cancel_and_expire_from_every_live_state() {
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
            assert!(status.can_transition_to(OrderStatus::Expired), "{status}");
        }
    }

    #[test]
    fn cannot_skip_steps() {
        assert_eq!(
            OrderStatus::Confirmed.transition(OrderStatus::Ready),
            Err(TransitionError::NotAllowed { from: OrderStatus::Confirmed, to: OrderStatus::Ready })
        );
        assert!(!OrderStatus::PendingPayment.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
    }

    #[test]
    fn guest_cancel_only_before_confirmation() {
        assert_eq!(OrderStatus::PendingPayment.guest_cancel(), Ok(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::CashOnDelivery.guest_cancel(), Ok(OrderStatus::Cancelled));
        assert!(OrderStatus::Preparing.guest_cancel().is_err());
        assert_eq!(
            OrderStatus::Expired.guest_cancel(),
            Err(TransitionError::Terminal(OrderStatus::Expired))
        );
    }

    #[test]
    fn payment_confirmation_moves_awaiting_transfer_orders() {
        assert_eq!(OrderStatus::PendingPayment.after_payment_confirmed(), Ok(OrderStatus::Confirmed));
        assert_eq!(OrderStatus::Preparing.after_payment_confirmed(), Ok(OrderStatus::Preparing));
        assert!(OrderStatus::Cancelled.after_payment_confirmed().is_err());
    }

    #[test]
    fn parses_every_status_string() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Ok(status));
            assert_eq!(serde_json::to_value(status).unwrap(), status.as_str());
        }
        assert!(matches!(OrderStatus::parse("served"), Err(TransitionError::UnknownStatus(_))));
    }
}
