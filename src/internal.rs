#[macro_use]
pub mod optim;

#[macro_use]
pub mod tls_slot;
