pub mod status;

pub use status::{OrderStatus, PaymentMethod, TransitionError};
