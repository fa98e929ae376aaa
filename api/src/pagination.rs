use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    settings::PaginationSettings,
};

/// Raw `pagenum` / `size` query values, kept as strings so bad input can be
/// handled per parameter instead of failing the whole query string.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub pagenum: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl PageParams {
    /// An unusable `size` falls back to the default, an unusable `pagenum` is a 404.
    pub fn resolve(&self, settings: &PaginationSettings) -> AppResult<PageRequest> {
        let size = self
            .size
            .as_deref()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|s| *s > 0)
            .map_or(settings.page_size, |s| s.min(settings.max_page_size));

        let number = match self.pagenum.as_deref() {
            None => 1,
            Some("last") => u32::MAX,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(AppError::InvalidPage)?,
        };

        Ok(PageRequest { number, size })
    }
}

impl PageRequest {
    pub fn page_count(&self, count: i64) -> u32 {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        count.div_ceil(self.size).max(1)
    }

    /// Clamp `last` to the final page and reject pages past the end.
    pub fn checked(self, count: i64) -> AppResult<Self> {
        let pages = self.page_count(count);
        match self.number {
            u32::MAX => Ok(Self {
                number: pages,
                ..self
            }),
            n if n > pages => Err(AppError::InvalidPage),
            _ => Ok(self),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn wrap<T>(&self, count: i64, results: Vec<T>) -> Page<T> {
        let pages = self.page_count(count);
        Page {
            count,
            next: (self.number < pages).then(|| self.number + 1),
            previous: (self.number > 1).then(|| self.number - 1),
            results,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SETTINGS: PaginationSettings = PaginationSettings {
        page_size: 2,
        max_page_size: 6,
    };

    fn params(pagenum: Option<&str>, size: Option<&str>) -> PageParams {
        PageParams {
            pagenum: pagenum.map(str::to_string),
            size: size.map(str::to_string),
        }
    }

    #[test]
    fn test_defaults() {
        let page = params(None, None).resolve(&SETTINGS).unwrap();
        assert_eq!(page, PageRequest { number: 1, size: 2 });
    }

    #[test]
    fn test_size_is_capped() {
        let page = params(None, Some("50")).resolve(&SETTINGS).unwrap();
        assert_eq!(page.size, 6);
    }

    #[test]
    fn test_bad_size_falls_back() {
        assert_eq!(params(None, Some("0")).resolve(&SETTINGS).unwrap().size, 2);
        assert_eq!(params(None, Some("abc")).resolve(&SETTINGS).unwrap().size, 2);
    }

    #[test]
    fn test_bad_page_is_invalid() {
        assert!(matches!(
            params(Some("zero"), None).resolve(&SETTINGS),
            Err(AppError::InvalidPage)
        ));
        assert!(matches!(
            params(Some("0"), None).resolve(&SETTINGS),
            Err(AppError::InvalidPage)
        ));
    }

    #[test]
    fn test_page_past_end() {
        let page = params(Some("3"), None).resolve(&SETTINGS).unwrap();
        assert!(page.checked(4).is_err());
        assert!(page.checked(5).is_ok());
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let page = params(None, None).resolve(&SETTINGS).unwrap().checked(0).unwrap();
        let wrapped = page.wrap::<()>(0, vec![]);
        assert_eq!(wrapped.next, None);
        assert_eq!(wrapped.previous, None);
    }

    #[test]
    fn test_last_page_and_links() {
        let page = params(Some("last"), None)
            .resolve(&SETTINGS)
            .unwrap()
            .checked(5)
            .unwrap();
        assert_eq!(page.number, 3);
        assert_eq!(page.offset(), 4);

        let wrapped = page.wrap(5, vec![1]);
        assert_eq!(wrapped.next, None);
        assert_eq!(wrapped.previous, Some(2));
    }
}
