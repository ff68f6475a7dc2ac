//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the hardware seams the blocking core consumes.
//!
//! ## Philosophy
//!
//! **Architecture must be fully abstracted and swappable.**
//!
//! The blocking core never touches an interrupt controller or a timer
//! register directly. It masks interrupts and reads ticks through these
//! traits, which a board crate or the simulator implements.
//!
//! ## Design Principles
//!
//! 1. **No architecture assumptions**: Core logic must work on any target
//! 2. **Trait-based**: All hardware operations go through traits
//! 3. **Testable**: Every trait has a deterministic simulated implementation

pub mod interrupts;
pub mod timer;

pub use interrupts::InterruptHal;
pub use timer::TimerDevice;
