mod common;

mod allocation;
mod forwarding;
