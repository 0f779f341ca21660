pub mod coupon;
pub mod order;
pub mod viewer;
pub mod wallet;

pub use coupon::{Coupon, CouponRejection, DiscountType};
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
pub use viewer::{Viewer, ViewerRole, USER_ID_HEADER, USER_ROLE_HEADER};
pub use wallet::{TransactionKind, Wallet, WalletTransaction};
