pub mod payment_methods;
pub mod payment_transactions;
pub mod subscriptions;
