//! Positional endpoint arguments.
//!
//! Endpoint pipelines are instantiated over [`Args`], a positional list
//! of [`Arg`] values compared element-wise. The list doubles as the
//! cache key, so `Arg` carries `Eq + Hash`; an empty list denotes the
//! zero-argument (singleton) entry.

use std::fmt;

/// One positional endpoint argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arg {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// A positional argument list.
pub type Args = Vec<Arg>;

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(value) => value.fmt(f),
            Arg::Int(value) => value.fmt(f),
            Arg::Bool(value) => value.fmt(f),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(value.into())
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_positional_and_element_wise() {
        let a: Args = vec![Arg::from("BTCUSDT"), Arg::from(42)];
        let b: Args = vec![Arg::from("BTCUSDT"), Arg::from(42)];
        let c: Args = vec![Arg::from(42), Arg::from("BTCUSDT")];
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_renders_inner_value() {
        assert_eq!(Arg::from("sym").to_string(), "sym");
        assert_eq!(Arg::from(7).to_string(), "7");
        assert_eq!(Arg::from(true).to_string(), "true");
    }
}
