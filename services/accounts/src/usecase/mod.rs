pub mod cleanup;
pub mod forgot_password;
pub mod rate_limit;
pub mod reset_code;
pub mod test_email;
