// Order lifecycle
pub mod order_status;
pub mod orders;

// Payments and money
pub mod coupons;
pub mod payments;
pub mod wallet;

use std::sync::Arc;
use tracing::info;

use crate::{config::AppConfig, events::EventSender};

use self::{
    coupons::CouponService, orders::OrderService, payments::GatewayService, wallet::WalletService,
};

/// Container for the services the HTTP layer depends on.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub payments: GatewayService,
    pub wallets: WalletService,
    pub coupons: CouponService,
}

impl AppServices {
    pub fn new(config: &AppConfig, event_sender: Arc<EventSender>) -> Self {
        let wallets = WalletService::new();
        let coupons = CouponService::new();
        if config.seed_coupons {
            coupons.seed_defaults();
            info!("Seeded starter coupon catalog");
        }

        let orders = OrderService::new(wallets.clone(), coupons.clone(), event_sender);
        let payments = GatewayService::new(
            orders.clone(),
            config.gateway_key_id.clone(),
            config.gateway_key_secret.clone(),
            config.currency.clone(),
        );

        Self {
            orders,
            payments,
            wallets,
            coupons,
        }
    }
}
