use strum::{EnumCount, EnumIter, IntoStaticStr};

/// The intercepted "begin critical access" operations.
///
/// The variant name doubles as the call-site label written into the event's
/// `operation` field, so `Operation::GetStringCritical` is recorded as
/// `"GetStringCritical"`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, IntoStaticStr, EnumIter, EnumCount, strum::Display,
)]
pub enum Operation {
    /// `GetStringCritical` / `ReleaseStringCritical`
    GetStringCritical,
    /// `GetPrimitiveArrayCritical` / `ReleasePrimitiveArrayCritical`
    GetPrimitiveArrayCritical,
}

impl Operation {
    /// The call-site label recorded in the `operation` field.
    #[must_use]
    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Dense index, used to address per-operation cached handles.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}
