//! Page/sort handling shared by every read path.
//!
//! Pages are 1-based at the API boundary and normalized to 0-based offsets
//! internally. Sorts arrive as `"field,direction"`; malformed input is a
//! hard validation error, never a silent default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SortError {
    #[error("malformed sort parameter: {0:?}")]
    Malformed(String),

    #[error("unknown sort direction: {0:?}")]
    UnknownDirection(String),

    #[error("field is not sortable: {0:?}")]
    UnsortableField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn parse(raw: &str) -> Result<Self, SortError> {
        let mut parts = raw.split(',');
        let field = parts.next().unwrap_or_default().trim();
        if field.is_empty() {
            return Err(SortError::Malformed(raw.to_string()));
        }

        let direction = match parts.next() {
            // Direction defaults to ascending when omitted.
            None => Direction::Asc,
            Some(direction) => match direction.trim().to_ascii_lowercase().as_str() {
                "asc" => Direction::Asc,
                "desc" => Direction::Desc,
                other => return Err(SortError::UnknownDirection(other.to_string())),
            },
        };

        if parts.next().is_some() {
            return Err(SortError::Malformed(raw.to_string()));
        }

        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }

    /// Map the caller-supplied field name through a whitelist of sortable
    /// columns. Anything not in the table is a validation error; sort input
    /// never reaches SQL directly.
    pub fn column(&self, columns: &[(&str, &'static str)]) -> Result<&'static str, SortError> {
        columns
            .iter()
            .find(|(field, _)| *field == self.field)
            .map(|(_, column)| *column)
            .ok_or_else(|| SortError::UnsortableField(self.field.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 1-based page number as supplied by the caller.
    pub page: u32,
    pub size: u32,
    pub sort: Sort,
}

impl PageRequest {
    pub fn new(page: u32, size: u32, sort: Sort) -> Self {
        Self { page, size, sort }
    }

    /// 0-based row offset.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
    pub total_elements: u64,
    pub contents: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn new(contents: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        let size = request.size.max(1);
        let total_pages = total_elements.div_ceil(u64::from(size)).max(1) as u32;
        Self {
            page: request.page.max(1),
            size: request.size,
            total_pages,
            total_elements,
            contents,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        PageResponse {
            page: self.page,
            size: self.size,
            total_pages: self.total_pages,
            total_elements: self.total_elements,
            contents: self.contents.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_and_direction() {
        let sort = Sort::parse("createdAt,desc").unwrap();
        assert_eq!(sort.field, "createdAt");
        assert_eq!(sort.direction, Direction::Desc);

        let sort = Sort::parse("createdAt,ASC").unwrap();
        assert_eq!(sort.direction, Direction::Asc);
    }

    #[test]
    fn direction_defaults_to_ascending() {
        let sort = Sort::parse("createdAt").unwrap();
        assert_eq!(sort.direction, Direction::Asc);
    }

    #[test]
    fn rejects_malformed_sorts() {
        assert!(matches!(Sort::parse(""), Err(SortError::Malformed(_))));
        assert!(matches!(Sort::parse(",desc"), Err(SortError::Malformed(_))));
        assert!(matches!(
            Sort::parse("createdAt,sideways"),
            Err(SortError::UnknownDirection(_))
        ));
        assert!(matches!(
            Sort::parse("createdAt,desc,extra"),
            Err(SortError::Malformed(_))
        ));
    }

    #[test]
    fn column_whitelist() {
        let sort = Sort::parse("createdAt,desc").unwrap();
        assert_eq!(sort.column(&[("createdAt", "created_at")]), Ok("created_at"));
        assert!(matches!(
            sort.column(&[("updatedAt", "updated_at")]),
            Err(SortError::UnsortableField(_))
        ));
    }

    #[test]
    fn pages_are_one_based() {
        let request = PageRequest::new(1, 20, Sort::descending("createdAt"));
        assert_eq!(request.offset(), 0);

        let request = PageRequest::new(3, 20, Sort::descending("createdAt"));
        assert_eq!(request.offset(), 40);

        // Page 0 is clamped rather than underflowing.
        let request = PageRequest::new(0, 20, Sort::descending("createdAt"));
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn page_response_totals() {
        let request = PageRequest::new(1, 10, Sort::descending("createdAt"));
        let response = PageResponse::new(vec![1, 2, 3], &request, 23);
        assert_eq!(response.total_pages, 3);
        assert_eq!(response.total_elements, 23);

        let empty = PageResponse::<i32>::new(vec![], &request, 0);
        assert_eq!(empty.total_pages, 1);
    }
}
