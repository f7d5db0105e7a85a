pub mod assistant;
pub mod booking;
pub mod booking_feed;
pub mod catalog;
pub mod imgbb;
pub mod invoice;
pub mod pricing;
pub mod whatsapp;
