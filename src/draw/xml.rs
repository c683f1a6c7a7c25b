//! Macros for writing HTML and SVG with the markup spelled out inline.
//!
//! `{expr}` content and attribute values are escaped, `!{expr}` is written as-is (for style
//! sheets and scripts). An attribute without a value is written bare.

use std::fmt::{self, Write};

#[macro_export]
macro_rules! markup_args {
    // ends a start tag
    (@attrs(> $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@content($($rest)*) -> ($($pattern),*, ">"), ($($args),*))
    };
    // ends a self-closing element
    (@attrs(/> $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@content($($rest)*) -> ($($pattern),*, " />"), ($($args),*))
    };
    // an attribute with a hyphenated name
    (@attrs($aname1:ident-$aname2:ident $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@value($($rest)*) -> ($($pattern),*, " ", stringify!($aname1), "-", stringify!($aname2)), ($($args),*))
    };
    // an attribute which fits in a rust identifier
    (@attrs($aname:ident $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@value($($rest)*) -> ($($pattern),*, " ", stringify!($aname)), ($($args),*))
    };

    // an expression as an attribute value
    (@value(={$avalue:expr} $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@attrs($($rest)*) -> ($($pattern),*, "=\"{}\""), ($($args,)* $crate::draw::xml::Escape(&$avalue)))
    };
    // a literal as an attribute value
    (@value(=$avalue:literal $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@attrs($($rest)*) -> ($($pattern),*, "=\"{}\""), ($($args,)* $crate::draw::xml::Escape(&$avalue)))
    };
    // no value
    (@value($($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@attrs($($rest)*) -> ($($pattern),*), ($($args),*))
    };

    // a start tag
    (@content(<$name:ident $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@attrs($($rest)*) -> ($($pattern),*, "<", stringify!($name)), ($($args),*))
    };
    // an end tag
    (@content(</$name:ident> $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@content($($rest)*) -> ($($pattern),*, "</", stringify!($name), ">"), ($($args),*))
    };
    // unescaped text
    (@content(!{$raw:expr} $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@content($($rest)*) -> ($($pattern),*, "{}"), ($($args,)* $raw))
    };
    // a text expression
    (@content({$text:expr} $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@content($($rest)*) -> ($($pattern),*, "{}"), ($($args,)* $crate::draw::xml::Escape(&$text)))
    };
    // a text literal
    (@content($text:literal $($rest:tt)*) -> ($($pattern:expr),*), ($($args:expr),*)) => {
        $crate::markup_args!(@content($($rest)*) -> ($($pattern),*, "{}"), ($($args,)* $crate::draw::xml::Escape(&$text)))
    };
    (@content() -> ($($pattern:expr),*), ($($args:expr),*)) => {
        format_args!(concat!($($pattern),*, "\n"), $($args),*)
    };

    // either an element or text to start
    ($($markup:tt)*) => {
        $crate::markup_args!(@content($($markup)*) -> (""), ())
    };
}

/// Write markup to anything with a `write_fmt`
#[macro_export]
macro_rules! write_markup {
    ($dst:expr, $($markup:tt)*) => {
        $dst.write_fmt($crate::markup_args!($($markup)*))
    }
}

/// Format markup as a `String`
#[macro_export]
macro_rules! format_markup {
    ($($markup:tt)*) => {{
        let mut s = String::new();
        let _ = std::fmt::Write::write_fmt(&mut s, $crate::markup_args!($($markup)*));
        s
    }}
}

/// Displays the wrapped value with `&`, `<`, `>` and quotes replaced by entities
pub struct Escape<T>(pub T);

impl<T: fmt::Display> fmt::Display for Escape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(EscapingWriter(f), "{}", self.0)
    }
}

struct EscapingWriter<'a, 'f>(&'a mut fmt::Formatter<'f>);

impl fmt::Write for EscapingWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut last = 0;
        for (idx, c) in s.char_indices() {
            let entity = match c {
                '&' => "&amp;",
                '<' => "&lt;",
                '>' => "&gt;",
                '"' => "&quot;",
                '\'' => "&#39;",
                _ => continue,
            };
            self.0.write_str(&s[last..idx])?;
            self.0.write_str(entity)?;
            last = idx + c.len_utf8();
        }
        self.0.write_str(&s[last..])
    }
}

#[cfg(test)]
mod test {
    #[test]
    fn self_closing() {
        assert_eq!(format_markup!(<tag />), "<tag />\n");
    }

    #[test]
    fn attributes() {
        assert_eq!(
            format_markup!(<tag att={"val"} att2={2} />),
            "<tag att=\"val\" att2=\"2\" />\n"
        );
    }

    #[test]
    fn literal_and_hyphenated_attributes() {
        assert_eq!(
            format_markup!(<circle fill-opacity="0.5" stroke-width={1.5} />),
            "<circle fill-opacity=\"0.5\" stroke-width=\"1.5\" />\n"
        );
    }

    #[test]
    fn bare_attribute() {
        assert_eq!(
            format_markup!(<input type="checkbox" checked name="raw" />),
            "<input type=\"checkbox\" checked name=\"raw\" />\n"
        );
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(
            format_markup!(<title>{"Clark St & Elm St"}</title>),
            "<title>Clark St &amp; Elm St</title>\n"
        );
        assert_eq!(
            format_markup!(<a title={"\"<quoted>\""}>"Tom's"</a>),
            "<a title=\"&quot;&lt;quoted&gt;&quot;\">Tom&#39;s</a>\n"
        );
    }

    #[test]
    fn raw_text_is_not_escaped() {
        assert_eq!(
            format_markup!(<style>!{"a > b { color: red; }"}</style>),
            "<style>a > b { color: red; }</style>\n"
        );
    }

    #[test]
    fn nested_elements() {
        assert_eq!(
            format_markup!(<g class="s"><circle r={3} /></g>),
            "<g class=\"s\"><circle r=\"3\" /></g>\n"
        );
    }

    #[test]
    fn text_first() {
        assert_eq!(format_markup!("a" {1} "b"), "a1b\n");
    }
}
