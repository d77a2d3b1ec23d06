/// Compiles a CSS selector once and hands out a `&'static` reference to it.
#[macro_export]
macro_rules! selector {
    ($e: expr) => {{
        use ::once_cell::sync::Lazy;
        use ::scraper::Selector;
        static SELECTOR: Lazy<Selector> =
            Lazy::new(|| Selector::parse($e).expect(concat!("invalid selector: ", $e)));
        &*SELECTOR
    }};
}

/// Compiles a regular expression once and hands out a `&'static` reference to it.
#[macro_export]
macro_rules! regex {
    ($e: expr) => {{
        use ::once_cell::sync::Lazy;
        use ::regex::Regex;
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new($e).expect(concat!("invalid pattern: ", $e)));
        &*PATTERN
    }};
}
