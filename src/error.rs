/// Errors returned by the interrupt allocation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A flag combination or out-of-range argument (`line`, `cpu`) was
    /// rejected before any state was touched.
    InvalidArg,
    /// No line satisfied the request's constraints, or a shared line's
    /// subscriber arena was already full.
    NotFound,
}

/// `Result` alias used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;
