mod debug_masking;
mod lifecycle;
mod mlock_verification;
mod zero_on_return;
