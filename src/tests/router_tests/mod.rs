mod orders_tests;
mod status_tests;
mod sync_tests;
