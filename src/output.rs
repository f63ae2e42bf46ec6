//! Colored terminal output helpers for the migration CLI.
//!
//! When the `colored-output` feature is enabled, uses the colored crate
//! for terminal styling. Otherwise, outputs plain text.

#[cfg(feature = "colored-output")]
pub use colored::Colorize;

#[cfg(not(feature = "colored-output"))]
pub mod colorize_shim {
    /// Wrapper type that acts like colored::ColoredString but does nothing.
    #[derive(Debug, Clone)]
    pub struct PlainString(pub String);

    impl std::fmt::Display for PlainString {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl PlainString {
        pub fn red(self) -> Self {
            self
        }
        pub fn green(self) -> Self {
            self
        }
        pub fn yellow(self) -> Self {
            self
        }
        pub fn cyan(self) -> Self {
            self
        }
        pub fn dimmed(self) -> Self {
            self
        }
        pub fn bold(self) -> Self {
            self
        }
    }

    /// No-op Colorize trait implementation for plain text output.
    pub trait Colorize {
        fn to_plain(&self) -> PlainString;

        fn red(&self) -> PlainString {
            self.to_plain()
        }
        fn green(&self) -> PlainString {
            self.to_plain()
        }
        fn yellow(&self) -> PlainString {
            self.to_plain()
        }
        fn cyan(&self) -> PlainString {
            self.to_plain()
        }
        fn dimmed(&self) -> PlainString {
            self.to_plain()
        }
        fn bold(&self) -> PlainString {
            self.to_plain()
        }
    }

    impl Colorize for &str {
        fn to_plain(&self) -> PlainString {
            PlainString(self.to_string())
        }
    }

    impl Colorize for str {
        fn to_plain(&self) -> PlainString {
            PlainString(self.to_string())
        }
    }

    impl Colorize for String {
        fn to_plain(&self) -> PlainString {
            PlainString(self.clone())
        }
    }
}

#[cfg(not(feature = "colored-output"))]
pub use colorize_shim::Colorize;

pub fn print_error(msg: &str) {
    #[cfg(feature = "colored-output")]
    {
        use colored::Colorize as _;
        eprintln!("{} {}", "[translate-proxy]".red(), msg);
    }

    #[cfg(not(feature = "colored-output"))]
    eprintln!("[translate-proxy] {}", msg);
}

pub fn print_info(msg: &str) {
    #[cfg(feature = "colored-output")]
    {
        use colored::Colorize as _;
        eprintln!("{} {}", "[translate-proxy]".cyan(), msg);
    }

    #[cfg(not(feature = "colored-output"))]
    eprintln!("[translate-proxy] {}", msg);
}

pub fn print_progress(msg: &str) {
    #[cfg(feature = "colored-output")]
    {
        use colored::Colorize as _;
        eprintln!("{} {}", "[translate-proxy]".dimmed(), msg);
    }

    #[cfg(not(feature = "colored-output"))]
    eprintln!("[translate-proxy] {}", msg);
}

pub fn print_success(msg: &str) {
    #[cfg(feature = "colored-output")]
    {
        use colored::Colorize as _;
        eprintln!("{} {}", "[translate-proxy]".green(), msg);
    }

    #[cfg(not(feature = "colored-output"))]
    eprintln!("[translate-proxy] {}", msg);
}
