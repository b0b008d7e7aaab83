mod helpers;
mod rate_limit_test;
mod test_email_test;
