/// Recommended error type for a scenario `main` function and any shared behaviour code written
/// for hooks. Compatible with [crate::definition::HookResult] so `?` propagates errors.
pub type StackliftResult<T> = anyhow::Result<T>;
