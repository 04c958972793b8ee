//! Device argument parsing.
//!
//! An argument string is a whitespace separated list of groups, one group per
//! device. A group is a comma separated list of `key=value` (or bare `key`)
//! parameters:
//!
//! ```text
//! numchan=3 rtl=0,buffers=32 file=/tmp/capture.cfile,rate=2e6,repeat=false
//! ```
//!
//! Single or double quotes protect separators inside a value and are removed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SourceError;

/// One parsed argument group. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    raw: String,
    params: Vec<(String, String)>,
}

impl DeviceDescriptor {
    /// Parse a single group (`key=value,key2,key3=value3`).
    pub fn parse(group: &str) -> Self {
        let mut params: Vec<(String, String)> = Vec::new();

        for param in split_unquoted(group, |c| c == ',', false) {
            let (key, value) = match param.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (param.trim(), ""),
            };
            if key.is_empty() {
                continue;
            }

            // last value wins, first position kept
            match params.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.to_string(),
                None => params.push((key.to_string(), value.to_string())),
            }
        }

        Self {
            raw: group.trim().to_string(),
            params,
        }
    }

    /// The group text exactly as the user wrote it (quotes included).
    pub fn as_args(&self) -> &str {
        &self.raw
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    /// Parse the value under `key`. A missing key is `Ok(None)`; a present but
    /// malformed value is a configuration error.
    pub fn parse_param<T: FromStr>(&self, key: &str) -> Result<Option<T>, SourceError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|_| {
                SourceError::ConfigurationFailed(format!(
                    "invalid value '{}' for parameter '{}'",
                    value, key
                ))
            }),
        }
    }

    /// Parse a boolean flag; a bare key counts as `true`.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, SourceError> {
        match self.get(key) {
            None => Ok(None),
            Some("") | Some("1") | Some("true") | Some("yes") | Some("on") => Ok(Some(true)),
            Some("0") | Some("false") | Some("no") | Some("off") => Ok(Some(false)),
            Some(other) => Err(SourceError::ConfigurationFailed(format!(
                "invalid boolean '{}' for parameter '{}'",
                other, key
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a full argument string into per-device descriptors.
pub fn parse_device_args(args: &str) -> Vec<DeviceDescriptor> {
    split_unquoted(args, char::is_whitespace, true)
        .into_iter()
        .map(|group| DeviceDescriptor::parse(&group))
        .filter(|d| !d.is_empty())
        .collect()
}

/// Number of output channels an argument string declares.
///
/// A `numchan=N` group sets the width for the whole source. Otherwise every
/// group contributes its `nchan` value, or one channel when it has none. The
/// larger of the two wins and the result is never below one.
pub fn declared_output_channels(args: &str) -> usize {
    let descriptors = parse_device_args(args);

    let global = descriptors
        .iter()
        .filter_map(|d| d.get("numchan"))
        .filter_map(|v| v.parse::<usize>().ok())
        .last()
        .unwrap_or(0);

    let per_device: usize = if global == 0 {
        descriptors
            .iter()
            .filter(|d| !d.contains_key("numchan"))
            .map(|d| {
                d.get("nchan")
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(1)
            })
            .sum()
    } else {
        0
    };

    global.max(per_device).max(1)
}

/// Split on `is_sep` outside of quotes, dropping empty pieces. Quote
/// characters are kept only when `keep_quotes` is set, so a later pass can
/// still see them.
fn split_unquoted(input: &str, is_sep: impl Fn(char) -> bool, keep_quotes: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                if keep_quotes {
                    current.push(c);
                }
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                if keep_quotes {
                    current.push(c);
                }
            }
            None if is_sep(c) => {
                if !current.trim().is_empty() {
                    pieces.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            None => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_groups_and_params() {
        let list = parse_device_args("rtl=0,buffers=32  file=/tmp/a.cfile,rate=2e6");
        assert_eq!(list.len(), 2);

        assert_eq!(list[0].get("rtl"), Some("0"));
        assert_eq!(list[0].get("buffers"), Some("32"));
        assert_eq!(list[0].as_args(), "rtl=0,buffers=32");

        assert_eq!(list[1].get("file"), Some("/tmp/a.cfile"));
        assert_eq!(list[1].parse_param::<f64>("rate").unwrap(), Some(2e6));
    }

    #[test]
    fn bare_key_has_empty_value() {
        let d = DeviceDescriptor::parse("hackrf,bias");
        assert!(d.contains_key("hackrf"));
        assert_eq!(d.get("bias"), Some(""));
        assert_eq!(d.flag("bias").unwrap(), Some(true));
    }

    #[test]
    fn quotes_protect_separators() {
        let list = parse_device_args("file='/tmp/my capture.cfile',label=\"a,b\" rtl=1");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].get("file"), Some("/tmp/my capture.cfile"));
        assert_eq!(list[0].get("label"), Some("a,b"));
    }

    #[test]
    fn duplicate_key_keeps_last_value() {
        let d = DeviceDescriptor::parse("rtl=0,rate=1e6,rtl=3");
        assert_eq!(d.get("rtl"), Some("3"));
        assert_eq!(d.iter().next(), Some(("rtl", "3")));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn malformed_param_is_configuration_error() {
        let d = DeviceDescriptor::parse("sim=0,nchan=two");
        assert!(matches!(
            d.parse_param::<usize>("nchan"),
            Err(SourceError::ConfigurationFailed(_))
        ));
        assert_eq!(d.parse_param::<usize>("missing").unwrap(), None);
    }

    #[test]
    fn empty_args_yield_no_descriptors() {
        assert!(parse_device_args("").is_empty());
        assert!(parse_device_args("   ").is_empty());
    }

    #[test]
    fn declared_width_defaults_to_one_per_group() {
        assert_eq!(declared_output_channels(""), 1);
        assert_eq!(declared_output_channels("rtl=0"), 1);
        assert_eq!(declared_output_channels("rtl=0 rtl=1 file=x"), 3);
    }

    #[test]
    fn declared_width_sums_nchan() {
        assert_eq!(declared_output_channels("uhd,nchan=2 rtl=0"), 3);
    }

    #[test]
    fn numchan_overrides_per_device_counts() {
        assert_eq!(declared_output_channels("numchan=4 rtl=0"), 4);
        assert_eq!(declared_output_channels("numchan=0 rtl=0 rtl=1"), 2);
    }
}
