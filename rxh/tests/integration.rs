mod common;

mod integration {
    mod failover_tests;
    mod helm_tests;
    mod helper_tests;
}
