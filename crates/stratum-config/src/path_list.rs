use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Colon separated list of paths, as used by `PATH`-style variables.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub struct PathList(Vec<Utf8PathBuf>);

impl PathList {
    /// Wraps the given paths.
    #[must_use]
    pub fn new(paths: Vec<Utf8PathBuf>) -> Self {
        Self(paths)
    }

    /// Iterates over the listed paths in order.
    pub fn iter(&self) -> impl Iterator<Item = &Utf8Path> {
        self.0.iter().map(Utf8PathBuf::as_path)
    }
}

impl FromStr for PathList {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            input
                .split(':')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(Utf8PathBuf::from)
                .collect(),
        ))
    }
}

impl From<String> for PathList {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(list) => list,
            Err(never) => match never {},
        }
    }
}

impl From<PathList> for String {
    fn from(list: PathList) -> Self {
        list.to_string()
    }
}

impl fmt::Display for PathList {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for path in &self.0 {
            if !first {
                formatter.write_str(":")?;
            }
            formatter.write_str(path.as_str())?;
            first = false;
        }
        Ok(())
    }
}
