use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

/// Query-string filters for the archer list.
#[derive(Debug, Default, Deserialize)]
pub struct ArcherFilter {
    #[serde(rename = "last_name__iexact")]
    pub last_name_iexact: Option<String>,
    #[serde(rename = "last_name__icontains")]
    pub last_name_icontains: Option<String>,
    #[serde(rename = "first_name__iexact")]
    pub first_name_iexact: Option<String>,
    #[serde(rename = "first_name__icontains")]
    pub first_name_icontains: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

const SEARCH_FIELDS: [&str; 3] = ["first_name", "last_name", "info"];
const ORDERING_FIELDS: [&str; 2] = ["first_name", "last_name"];

/// Escape LIKE wildcards so user input only ever matches literally.
pub fn like_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub fn push_iexact(query: &mut QueryBuilder<'_, Sqlite>, column: &str, value: &str) {
    query.push(format!(" AND {column} LIKE "));
    query.push_bind(like_escape(value));
    query.push(" ESCAPE '\\'");
}

pub fn push_icontains(query: &mut QueryBuilder<'_, Sqlite>, column: &str, value: &str) {
    query.push(format!(" AND {column} LIKE "));
    query.push_bind(format!("%{}%", like_escape(value)));
    query.push(" ESCAPE '\\'");
}

impl ArcherFilter {
    /// Search terms, split on whitespace and commas.
    pub fn search_terms(&self) -> Vec<&str> {
        self.search
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|term| !term.is_empty())
            .collect()
    }

    /// `ORDER BY` clause built from whitelisted fields; unknown fields are ignored.
    pub fn order_by(&self) -> String {
        let mut columns: Vec<String> = self
            .ordering
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter_map(|field| {
                let (name, direction) = match field.strip_prefix('-') {
                    Some(name) => (name, "DESC"),
                    None => (field, "ASC"),
                };
                ORDERING_FIELDS
                    .contains(&name)
                    .then(|| format!("{name} {direction}"))
            })
            .collect();
        // rowid keeps pages stable between requests
        columns.push("rowid".to_string());
        format!(" ORDER BY {}", columns.join(", "))
    }

    /// Append ` AND ...` conditions; the query must already contain a `WHERE`.
    pub fn push_conditions(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(value) = &self.last_name_iexact {
            push_iexact(query, "last_name", value);
        }
        if let Some(value) = &self.last_name_icontains {
            push_icontains(query, "last_name", value);
        }
        if let Some(value) = &self.first_name_iexact {
            push_iexact(query, "first_name", value);
        }
        if let Some(value) = &self.first_name_icontains {
            push_icontains(query, "first_name", value);
        }

        for term in self.search_terms() {
            let pattern = format!("%{}%", like_escape(term));
            query.push(" AND (");
            let mut fields = query.separated(" OR ");
            for field in SEARCH_FIELDS {
                fields.push(format!("{field} LIKE "));
                fields.push_bind_unseparated(pattern.clone());
                fields.push_unseparated(" ESCAPE '\\'");
            }
            query.push(")");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn filter(search: Option<&str>, ordering: Option<&str>) -> ArcherFilter {
        ArcherFilter {
            search: search.map(str::to_string),
            ordering: ordering.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_like_escape() {
        assert_eq!(like_escape("100%_a\\b"), "100\\%\\_a\\\\b");
    }

    #[test]
    fn test_search_terms() {
        let f = filter(Some(" smul, harrie  jan"), None);
        assert_eq!(f.search_terms(), vec!["smul", "harrie", "jan"]);
        assert!(filter(None, None).search_terms().is_empty());
    }

    #[test]
    fn test_order_by() {
        assert_eq!(filter(None, None).order_by(), " ORDER BY rowid");
        assert_eq!(
            filter(None, Some("-last_name,first_name,info")).order_by(),
            " ORDER BY last_name DESC, first_name ASC, rowid"
        );
    }

    #[test]
    fn test_conditions_sql() {
        let f = ArcherFilter {
            last_name_icontains: Some("smul".to_string()),
            search: Some("harrie".to_string()),
            ..Default::default()
        };
        let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM archers WHERE 1 = 1");
        f.push_conditions(&mut query);
        let sql = query.sql();
        assert!(sql.contains("last_name LIKE ? ESCAPE '\\'"));
        assert!(sql.contains("(first_name LIKE ? ESCAPE '\\' OR last_name LIKE ? ESCAPE '\\' OR info LIKE ? ESCAPE '\\')"));
    }
}
