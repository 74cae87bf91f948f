pub mod dispatch;
pub mod index;

pub use dispatch::{DeliveryPool, ScnEngine, ScnJob};
pub use index::{Dimension, SubscriptionIndex, UrlEntry};
