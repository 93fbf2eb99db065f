/// Job controller and completion hand-off.
pub mod job;
/// Readiness-driven drain loop.
pub mod pump;
