pub mod auth;
pub mod notifications;
pub mod payment;
pub mod razorpay;
pub mod results;
pub mod users;
