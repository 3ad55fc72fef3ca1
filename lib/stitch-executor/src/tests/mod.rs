pub mod testkit;

mod introspecting;
mod subscribing;
