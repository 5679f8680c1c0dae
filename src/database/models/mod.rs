pub mod bank_details;
pub mod feature_flag;
pub mod menu;
pub mod order;
pub mod profile;
pub mod table;
pub mod venue;

pub use bank_details::BankDetails;
pub use feature_flag::FeatureFlag;
pub use menu::{Category, MenuItem};
pub use order::{Order, OrderItem, PaymentClaim, PaymentConfirmation};
pub use profile::{Member, Profile};
pub use table::DiningTable;
pub use venue::Venue;
