pub mod components;
pub mod discover;
pub mod ethinterfaces;
pub mod groups;
pub mod inventory;
pub mod locks;
pub mod maps;
pub mod rfendpoints;
pub mod service;
pub mod subscriptions;
