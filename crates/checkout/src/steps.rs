//! Checkout step names, used in logs and metrics labels.

/// Step name: Re-price the cart from the catalog.
pub const STEP_PRICE_CART: &str = "price_cart";

/// Step name: Charge the buyer through the gateway.
pub const STEP_CHARGE: &str = "charge";

/// Step name: Persist the order record.
pub const STEP_PERSIST_ORDER: &str = "persist_order";

/// Step name: Decrement stock per cart line.
pub const STEP_ADJUST_INVENTORY: &str = "adjust_inventory";
