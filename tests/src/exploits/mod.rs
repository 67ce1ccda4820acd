//! # Attack Simulations
//!
//! Adversarial inputs against the bucket tables. Each module floods the
//! manager the way an eclipse attacker would and checks what it can reach.

pub mod eclipse_flooding;
pub mod tried_poisoning;
