pub mod outbox_events;
pub mod password_reset_codes;
pub mod users;
