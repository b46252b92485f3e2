use std::collections::BTreeSet;

pub const DEFAULT_ID_FIELD: &str = "_id";
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const PAGE_SIZE_CHOICES: [u64; 3] = [20, 50, 100];
pub const MAX_PAGE_SIZE: u64 = 1000;
pub const DEFAULT_CELL_WIDTH: usize = 150;
pub const DEFAULT_STRUCTURED_FIELDS: [&str; 6] = [
    "attrs",
    "location",
    "metadata",
    "servicePath",
    "attrNames",
    "entityType",
];

/// Per-session browsing knobs, fixed for the lifetime of a collection view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseSettings {
    pub id_field: String,
    pub page_size: u64,
    /// Maximum display width of a grid cell before truncation.
    pub cell_width: usize,
    /// Fields always edited as structured text, whatever their current display.
    pub structured_fields: BTreeSet<String>,
}

impl Default for BrowseSettings {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            cell_width: DEFAULT_CELL_WIDTH,
            structured_fields: DEFAULT_STRUCTURED_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect(),
        }
    }
}

impl BrowseSettings {
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_cell_width(mut self, cell_width: usize) -> Self {
        self.cell_width = cell_width.max(1);
        self
    }

    /// Replace the structured field set. An empty iterator keeps the defaults.
    pub fn with_structured_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: BTreeSet<String> = fields
            .into_iter()
            .map(|field| field.as_ref().trim().to_string())
            .filter(|field| !field.is_empty())
            .collect();
        if !fields.is_empty() {
            self.structured_fields = fields;
        }
        self
    }

    pub fn is_structured_field(&self, field: &str) -> bool {
        self.structured_fields.contains(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_known_structured_fields() {
        let settings = BrowseSettings::default();
        assert_eq!(settings.id_field, "_id");
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.cell_width, 150);
        assert!(settings.is_structured_field("attrs"));
        assert!(!settings.is_structured_field("value"));
    }

    #[test]
    fn structured_fields_can_be_replaced() {
        let settings = BrowseSettings::default().with_structured_fields([" payload ", ""]);
        assert!(settings.is_structured_field("payload"));
        assert!(!settings.is_structured_field("attrs"));

        let unchanged = BrowseSettings::default().with_structured_fields(Vec::<String>::new());
        assert!(unchanged.is_structured_field("attrs"));
    }
}
