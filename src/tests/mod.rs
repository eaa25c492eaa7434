mod config_tests;
mod urn_property_tests;
