use std::fmt::{self, Write};
use std::str::FromStr;

use crate::encoding::MapMarker;

/// What a station's tooltip shows unless configured otherwise
pub const DEFAULT_TOOLTIP: &str = "{name}
Capacity: {capacity}
Bikes Available: {num_bikes_available}
Docks Available: {num_docks_available}
Out of Service: {out_of_service_bikes}
Utilization: {bike_utilization:.0%}";

/// A tooltip with `{field}` placeholders naming [`MapMarker`] fields.
///
/// A placeholder may carry a format: `{field:.2}` for fixed decimals, `{field:.0%}` for a
/// percentage. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipTemplate {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text(String),
    Field(Field, Format),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Field {
    Name,
    Lat,
    Lon,
    Radius,
    Capacity,
    NumBikesAvailable,
    NumDocksAvailable,
    OutOfServiceBikes,
    BikeUtilization,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Format {
    Plain,
    Fixed(usize),
    Percent(usize),
}

enum Value<'m> {
    Text(&'m str),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    UnknownField(String),
    InvalidFormat(String),
    UnclosedPlaceholder,
    UnmatchedBrace,
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TemplateError::*;
        match self {
            UnknownField(name) => write!(f, "tooltip refers to unknown field '{}'", name),
            InvalidFormat(spec) => write!(f, "tooltip format '{}' should be like .2 or .0%", spec),
            UnclosedPlaceholder => write!(f, "tooltip has a '{{' without a closing '}}'"),
            UnmatchedBrace => write!(f, "tooltip has a '}}' without an opening '{{', use '}}}}'"),
        }
    }
}

impl std::error::Error for TemplateError {}

impl FromStr for Field {
    type Err = TemplateError;

    fn from_str(name: &str) -> Result<Field, TemplateError> {
        use Field::*;
        Ok(match name {
            "name" => Name,
            "lat" => Lat,
            "lon" => Lon,
            "radius" => Radius,
            "capacity" => Capacity,
            "num_bikes_available" => NumBikesAvailable,
            "num_docks_available" => NumDocksAvailable,
            "out_of_service_bikes" => OutOfServiceBikes,
            "bike_utilization" => BikeUtilization,
            other => return Err(TemplateError::UnknownField(other.to_owned())),
        })
    }
}

impl FromStr for Format {
    type Err = TemplateError;

    fn from_str(spec: &str) -> Result<Format, TemplateError> {
        let invalid = || TemplateError::InvalidFormat(spec.to_owned());
        let digits = spec.strip_prefix('.').ok_or_else(invalid)?;
        if let Some(digits) = digits.strip_suffix('%') {
            digits.parse().map(Format::Percent).map_err(|_| invalid())
        } else {
            digits.parse().map(Format::Fixed).map_err(|_| invalid())
        }
    }
}

impl Field {
    fn value(self, marker: &MapMarker) -> Value<'_> {
        use Field::*;
        match self {
            Name => Value::Text(&marker.name),
            Lat => Value::Number(marker.lat),
            Lon => Value::Number(marker.lon),
            Radius => Value::Number(marker.radius as f64),
            Capacity => Value::Number(marker.capacity as f64),
            NumBikesAvailable => Value::Number(marker.num_bikes_available as f64),
            NumDocksAvailable => Value::Number(marker.num_docks_available as f64),
            OutOfServiceBikes => Value::Number(marker.out_of_service_bikes as f64),
            BikeUtilization => Value::Number(marker.bike_utilization),
        }
    }
}

impl FromStr for TooltipTemplate {
    type Err = TemplateError;

    fn from_str(template: &str) -> Result<TooltipTemplate, TemplateError> {
        let mut parts = vec![];
        let mut text = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace),
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => placeholder.push(c),
                            None => return Err(TemplateError::UnclosedPlaceholder),
                        }
                    }
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    let (name, format) = match placeholder.split_once(':') {
                        Some((name, spec)) => (name, spec.parse()?),
                        None => (placeholder.as_str(), Format::Plain),
                    };
                    parts.push(Part::Field(name.trim().parse()?, format));
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Ok(TooltipTemplate { parts })
    }
}

impl Default for TooltipTemplate {
    fn default() -> TooltipTemplate {
        TooltipTemplate::from_str(DEFAULT_TOOLTIP).expect("default tooltip to parse")
    }
}

impl TooltipTemplate {
    pub fn render(&self, marker: &MapMarker) -> String {
        let mut out = String::new();
        for part in &self.parts {
            // writing to a String can't fail
            let _ = match part {
                Part::Text(text) => out.write_str(text),
                Part::Field(field, format) => match (field.value(marker), format) {
                    (Value::Text(text), _) => out.write_str(text),
                    (Value::Number(n), Format::Plain) => write!(out, "{}", n),
                    (Value::Number(n), Format::Fixed(precision)) => {
                        write!(out, "{:.*}", precision, n)
                    }
                    (Value::Number(n), Format::Percent(precision)) => {
                        write!(out, "{:.*}%", precision, n * 100.)
                    }
                },
            };
        }
        out
    }
}
