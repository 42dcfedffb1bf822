use serde::Serialize;

use super::{error::TypeError, form::Form};

/// Requested page: 1-based `number`, `size` rows per page. `base_url` is the
/// absolute URL of the listing, used to build the neighbour links.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
    pub base_url: String,
}

impl Page {
    /// Page numbers past the last representable offset are clamped to it.
    pub fn new(number: i64, size: i64, base_url: &str) -> Self {
        let size = size.max(1);

        Self {
            number: number.clamp(1, i64::MAX / size),
            size,
            base_url: base_url.to_owned(),
        }
    }

    pub fn from_form(
        form: &Form,
        default_size: i64,
        max_size: i64,
        base_url: &str,
    ) -> Result<Self, TypeError> {
        let number = form.get_optional_number::<i64>("page")?.unwrap_or(1);
        let size = form
            .get_optional_number::<i64>("limit")?
            .unwrap_or(default_size)
            .min(max_size);

        Ok(Self::new(number, size, base_url))
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }

    fn link(&self, number: i64) -> String {
        format!("{}?page={}&limit={}", self.base_url, number, self.size)
    }
}

#[derive(Serialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: &Page) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows, page);
        }

        let shown = page.offset().saturating_add(rows.len() as i64);
        let next = (shown < total_rows).then(|| page.link(page.number.saturating_add(1)));
        let previous = (page.number > 1).then(|| page.link(page.number - 1));

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn no_rows(total_rows: i64, page: &Page) -> Self {
        Self {
            count: total_rows,
            next: None,
            previous: (page.number > 1).then(|| page.link(page.number - 1)),
            results: vec![],
        }
    }
}
