use std::str::FromStr;

use super::error::TypeError;

/// Raw `key=value` pairs of a query string. Keys may repeat.
pub type FormData = Vec<(String, String)>;

pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: FromStr,
    {
        match self.first(key) {
            Some(value) => value
                .parse()
                .map_err(|_e| TypeError::new(&format!("`{key}` must be a number"))),
            None => Err(TypeError::new(&format!("`{key}` is required"))),
        }
    }

    pub fn get_optional_number<T>(&self, key: &str) -> Result<Option<T>, TypeError>
    where
        T: FromStr,
    {
        match self.first(key) {
            Some(_) => self.get_number(key).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.first(key)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    /// `1` switches a filter on, `0` or absence leaves it off.
    pub fn get_flag(&self, key: &str) -> Result<bool, TypeError> {
        match self.first(key) {
            None | Some("") | Some("0") => Ok(false),
            Some("1") => Ok(true),
            Some(_) => Err(TypeError::new(&format!("`{key}` must be 0 or 1"))),
        }
    }
}
