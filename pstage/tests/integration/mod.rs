mod command_tests;
mod script_tests;
