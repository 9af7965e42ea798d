use colored::{
    Color,
    Colorize,
};
use solana_sdk::signature::Signature;

/// Format a key/value pair with optional color overrides.
///
/// Requires the `colored::Colorize` trait to be in scope.
///
/// Examples, where `key_color` and `value_color` are `LogColor` values:
/// - fmt_kv!(key, value)
/// - fmt_kv!(key, value, key_color)
/// - fmt_kv!(key, value, key_color, value_color)
#[macro_export]
macro_rules! fmt_kv {
    ($key:expr, $value:expr $(,)?) => {
        $crate::fmt_kv!(
            $key,
            $value,
            $crate::LogColor::Highlight,
            $crate::LogColor::FadedGray
        )
    };
    ($key:expr, $value:expr, $key_color:expr $(,)?) => {
        $crate::fmt_kv!($key, $value, $key_color, $crate::LogColor::FadedGray)
    };
    ($key:expr, $value:expr, $key_color:expr, $value_color:expr $(,)?) => {{
        let __k = ::std::string::ToString::to_string(&$key);
        let __v = ::std::string::ToString::to_string(&$value);
        ::std::format!("{}: {}", __k.color($key_color), __v.color($value_color))
    }};
}

/// Prints a key/value pair with optional color overrides. Same arguments as [`fmt_kv!`].
#[macro_export]
macro_rules! print_kv {
    ($key:expr, $value:expr $(,)?) => {
        ::std::println!("{}", $crate::fmt_kv!($key, $value))
    };
    ($key:expr, $value:expr, $key_color:expr $(,)?) => {
        ::std::println!("{}", $crate::fmt_kv!($key, $value, $key_color))
    };
    ($key:expr, $value:expr, $key_color:expr, $value_color:expr $(,)?) => {
        ::std::println!(
            "{}",
            $crate::fmt_kv!($key, $value, $key_color, $value_color)
        )
    };
}

#[derive(Clone, Copy, Debug)]
pub enum LogColor {
    Highlight,
    Debug,
    Error,
    Warning,
    Header,
    Info,
    FadedGray,
}

#[rustfmt::skip]
impl From<LogColor> for Color {
    fn from(value: LogColor) -> Color {
        match value {
            LogColor::Highlight  => Color::TrueColor { r: 255, g: 215, b: 87  },
            LogColor::Debug      => Color::TrueColor { r: 40,  g: 100, b: 153 },
            LogColor::Error      => Color::TrueColor { r: 255, g: 0,   b: 45  },
            LogColor::Warning    => Color::TrueColor { r: 180, g: 105, b: 0   },
            LogColor::Header     => Color::TrueColor { r: 0,   g: 255, b: 0   },
            LogColor::Info       => Color::TrueColor { r: 0,   g: 95,  b: 255 },
            LogColor::FadedGray  => Color::TrueColor { r: 95,  g: 95,  b: 95  },
        }
    }
}

pub fn fmt_divider() -> String {
    "-".repeat(80)
}

pub fn log_divider() {
    println!("{}", fmt_divider());
}

pub fn log_header(title: &str) {
    log_divider();
    println!("{}", title.color(LogColor::Header).bold());
}

/// Prints a confirmed transaction's signature along with what it did.
pub fn log_confirmed(action: &str, signature: &Signature) {
    print_kv!(action, signature, LogColor::Info);
}

/// Prints the program logs attached to a rejected transaction, one per line.
pub fn log_program_logs(logs: &[String]) {
    for line in logs {
        println!("  {}", line.color(LogColor::FadedGray));
    }
}
