// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::MethodGroupParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::{fmt, str::FromStr};

/// The identity of a test case: the class it belongs to and the method it runs.
///
/// A `MethodGroup` is the identifier shared between a discovery pass, a later filtered run, and
/// any external tool consuming the result stream. Its textual form is `Class.Method`. Class
/// names may themselves contain `.` (for namespaced classes); method names may not, so parsing
/// splits at the last `.`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodGroup {
    class: SmolStr,
    method: SmolStr,
}

impl MethodGroup {
    /// Creates a new `MethodGroup` from a class name and a method name.
    pub fn new(class: impl Into<SmolStr>, method: impl Into<SmolStr>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Returns the class name.
    #[inline]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the method name.
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the full name of this method group, `Class.Method`.
    pub fn full_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

impl FromStr for MethodGroup {
    type Err = MethodGroupParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((class, method)) = s.rsplit_once('.') else {
            return Err(MethodGroupParseError::new(
                s,
                "expected a full name of the form `Class.Method`",
            ));
        };
        if class.is_empty() {
            return Err(MethodGroupParseError::new(s, "class name is empty"));
        }
        if method.is_empty() {
            return Err(MethodGroupParseError::new(s, "method name is empty"));
        }
        Ok(Self::new(class, method))
    }
}

impl Serialize for MethodGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MethodGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
