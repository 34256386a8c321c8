pub mod bookings;
pub mod checkin;
pub mod guests;
